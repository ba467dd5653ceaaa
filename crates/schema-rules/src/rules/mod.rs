//! Schema rules: declarative units of physical schema.
//!
//! A [`SchemaRule`] is a data record describing one column, index, constraint,
//! junction table or metadata row that a field needs. Each rule can:
//!
//! - produce the statements that create it ([`SchemaRule::up`])
//! - produce the statements that remove it ([`SchemaRule::down`])
//! - check the live catalog for it ([`SchemaRule::is_valid`])
//!
//! `up` and `down` are pure and never touch a connection; only `is_valid`
//! reads the catalog, through the
//! [`SchemaIntrospector`](crate::introspect::SchemaIntrospector) carried by the
//! [`SchemaRuleContext`]. Rules are built by the
//! [`RuleFactory`](crate::factory::RuleFactory) and ordered by the
//! [`resolver`](crate::resolver).

mod column;
mod context;
mod link;
mod metadata;
mod symmetric;

pub use context::{ApplyMode, SchemaRuleContext};

use serde::Serialize;

use crate::core::identifier::TableIdentifier;
use crate::core::schema::DbFieldType;
use crate::core::statement::Statement;
use crate::ddl::ReferentialAction;
use crate::error::Result;

/// Qualifier prefix of rules that touch another table's keys and may need a
/// second pass once every table of a batch exists.
pub const DEFERRABLE_PREFIX: &str = "fk_";

/// A column on a specific table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTarget {
    pub table: TableIdentifier,
    pub column: String,
    pub db_type: DbFieldType,
    /// Skip creation when the table does not exist yet.
    pub guarded: bool,
}

/// A named index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTarget {
    pub table: TableIdentifier,
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub guarded: bool,
}

/// A named single-column foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyTarget {
    pub table: TableIdentifier,
    pub name: String,
    pub column: String,
    pub referenced: TableIdentifier,
    pub referenced_column: String,
    pub on_delete: ReferentialAction,
}

/// A junction table and its two key columns.
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionTarget {
    pub table: TableIdentifier,
    pub self_key: String,
    pub foreign_key: String,
}

/// What a rule enforces, with everything needed to do so.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// The field's own value column.
    Column(ColumnTarget),
    /// `NOT NULL` on an existing column.
    NotNull { table: TableIdentifier, column: String },
    /// Unique index over the field's column.
    UniqueColumn(IndexTarget),
    /// Stored generated column mirroring a base column.
    GeneratedColumn {
        target: ColumnTarget,
        source_column: String,
    },
    /// jsonb column caching a link's display value.
    LinkValueColumn(ColumnTarget),
    /// Text column holding a linked record id.
    FkColumn(ColumnTarget),
    /// Plain or unique index supporting a link.
    Index(IndexTarget),
    /// Foreign key constraint supporting a link.
    ForeignKey(ForeignKeyTarget),
    /// Column persisting the manual order of linked records.
    OrderColumn(ColumnTarget),
    /// Junction table with its key columns.
    JunctionTable(JunctionTarget),
    /// Composite unique constraint over a junction's key columns.
    JunctionUnique(JunctionTarget),
    /// Boolean flag in the field record's `meta` JSON.
    FieldMeta {
        field_id: String,
        key: String,
        value: bool,
    },
    /// Reference ledger edges from `sources` to the field.
    Reference {
        field_id: String,
        sources: Vec<String>,
    },
    /// Consistency of a two-way link with its symmetric counterpart.
    LinkSymmetricField {
        field_id: String,
        table_id: String,
        foreign_table_id: String,
        symmetric_field_id: String,
    },
}

impl RuleKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Column(_) => "column",
            RuleKind::NotNull { .. } => "not_null",
            RuleKind::UniqueColumn(_) => "unique",
            RuleKind::GeneratedColumn { .. } => "generated_column",
            RuleKind::LinkValueColumn(_) => "link_value_column",
            RuleKind::FkColumn(_) => "fk_column",
            RuleKind::Index(_) => "index",
            RuleKind::ForeignKey(_) => "foreign_key",
            RuleKind::OrderColumn(_) => "order_column",
            RuleKind::JunctionTable(_) => "junction_table",
            RuleKind::JunctionUnique(_) => "junction_unique",
            RuleKind::FieldMeta { .. } => "field_meta",
            RuleKind::Reference { .. } => "reference",
            RuleKind::LinkSymmetricField { .. } => "link_symmetric_field",
        }
    }
}

/// Outcome of checking one rule against the live catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Objects or facts that should exist but do not.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Objects or facts that exist but should not, or have the wrong shape.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn missing(item: impl Into<String>) -> Self {
        Self::from_findings(vec![item.into()], Vec::new())
    }

    pub fn extra(item: impl Into<String>) -> Self {
        Self::from_findings(Vec::new(), vec![item.into()])
    }

    /// Valid exactly when there are no findings.
    pub fn from_findings(missing: Vec<String>, extra: Vec<String>) -> Self {
        Self {
            valid: missing.is_empty() && extra.is_empty(),
            missing,
            extra,
        }
    }

    /// One-line summary of the findings.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing: {}", self.missing.join(", ")));
        }
        if !self.extra.is_empty() {
            parts.push(format!("unexpected: {}", self.extra.join(", ")));
        }
        if parts.is_empty() {
            "ok".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// One unit of physical schema owned by a field.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRule {
    /// `{field_id}:{qualifier}`, unique within a batch.
    pub id: String,
    pub field_id: String,
    pub description: String,
    /// A missing required rule is an error; a missing optional rule a warning.
    pub required: bool,
    /// Ids of rules that must be applied first.
    pub dependencies: Vec<String>,
    pub kind: RuleKind,
}

impl SchemaRule {
    pub fn new(
        field_id: &str,
        qualifier: &str,
        description: impl Into<String>,
        kind: RuleKind,
    ) -> Self {
        Self {
            id: format!("{}:{}", field_id, qualifier),
            field_id: field_id.to_string(),
            description: description.into(),
            required: true,
            dependencies: Vec::new(),
            kind,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn depends_on(mut self, rule_id: impl Into<String>) -> Self {
        self.dependencies.push(rule_id.into());
        self
    }

    /// Id without the field prefix.
    pub fn qualifier(&self) -> &str {
        self.id
            .strip_prefix(self.field_id.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(&self.id)
    }

    /// Whether the rule belongs to the foreign-key family re-applied after a
    /// multi-table insert.
    pub fn is_deferrable(&self) -> bool {
        self.qualifier().starts_with(DEFERRABLE_PREFIX)
    }

    /// Statements that create whatever this rule describes.
    pub fn up(&self, ctx: &SchemaRuleContext<'_>) -> Result<Vec<Statement>> {
        match &self.kind {
            RuleKind::Column(t)
            | RuleKind::LinkValueColumn(t)
            | RuleKind::FkColumn(t)
            | RuleKind::OrderColumn(t) => column::add(t),
            RuleKind::NotNull { table, column } => column::set_not_null(table, column),
            RuleKind::UniqueColumn(t) | RuleKind::Index(t) => link::create_index(t),
            RuleKind::GeneratedColumn {
                target,
                source_column,
            } => column::add_generated(target, source_column, ctx.mode),
            RuleKind::ForeignKey(t) => link::add_foreign_key(t),
            RuleKind::JunctionTable(t) => link::create_junction(t),
            RuleKind::JunctionUnique(t) => link::add_junction_unique(t),
            RuleKind::FieldMeta {
                field_id,
                key,
                value,
            } => metadata::set_meta(ctx.metadata, field_id, key, *value),
            RuleKind::Reference { field_id, sources } => {
                metadata::insert_references(ctx.metadata, field_id, sources)
            }
            RuleKind::LinkSymmetricField { .. } => Ok(Vec::new()),
        }
    }

    /// Statements that remove whatever this rule describes.
    pub fn down(&self, ctx: &SchemaRuleContext<'_>) -> Result<Vec<Statement>> {
        match &self.kind {
            RuleKind::Column(t)
            | RuleKind::LinkValueColumn(t)
            | RuleKind::FkColumn(t)
            | RuleKind::OrderColumn(t)
            | RuleKind::GeneratedColumn { target: t, .. } => column::drop(t),
            RuleKind::NotNull { table, column } => column::drop_not_null(table, column),
            RuleKind::UniqueColumn(t) | RuleKind::Index(t) => link::drop_index(t),
            RuleKind::ForeignKey(t) => link::drop_foreign_key(t),
            RuleKind::JunctionTable(t) => link::drop_junction(t),
            RuleKind::JunctionUnique(t) => link::drop_junction_unique(t),
            RuleKind::FieldMeta { field_id, key, .. } => {
                metadata::clear_meta(ctx.metadata, field_id, key)
            }
            RuleKind::Reference { field_id, .. } => {
                metadata::delete_references(ctx.metadata, field_id)
            }
            RuleKind::LinkSymmetricField { .. } => Ok(Vec::new()),
        }
    }

    /// Check the live catalog for this rule.
    pub async fn is_valid(&self, ctx: &SchemaRuleContext<'_>) -> Result<ValidationResult> {
        match &self.kind {
            RuleKind::Column(t)
            | RuleKind::LinkValueColumn(t)
            | RuleKind::FkColumn(t)
            | RuleKind::OrderColumn(t) => column::validate(ctx, t).await,
            RuleKind::NotNull { table, column } => {
                column::validate_not_null(ctx, table, column).await
            }
            RuleKind::GeneratedColumn {
                target,
                source_column,
            } => column::validate_generated(ctx, target, source_column).await,
            RuleKind::UniqueColumn(t) | RuleKind::Index(t) => link::validate_index(ctx, t).await,
            RuleKind::ForeignKey(t) => link::validate_foreign_key(ctx, t).await,
            RuleKind::JunctionTable(t) => link::validate_junction(ctx, t).await,
            RuleKind::JunctionUnique(t) => link::validate_junction_unique(ctx, t).await,
            RuleKind::FieldMeta {
                field_id,
                key,
                value,
            } => metadata::validate_meta(ctx, field_id, key, *value).await,
            RuleKind::Reference { field_id, sources } => {
                metadata::validate_references(ctx, field_id, sources).await
            }
            RuleKind::LinkSymmetricField {
                field_id,
                table_id,
                foreign_table_id,
                symmetric_field_id,
            } => {
                symmetric::validate(ctx, field_id, table_id, foreign_table_id, symmetric_field_id)
                    .await
            }
        }
    }
}
