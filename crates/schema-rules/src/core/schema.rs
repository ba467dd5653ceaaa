//! Logical table and field model consumed by the rule factory.
//!
//! The engine does not validate or name fields; it only reads what the product
//! layer hands over. [`FieldKind`] is a closed enum so every consumer has to
//! handle every kind of field explicitly.

use serde::{Deserialize, Serialize};

use super::identifier::TableIdentifier;
use crate::error::{Result, SchemaError};

/// Base column holding the record id.
pub const ID_COLUMN: &str = "__id";
/// Base serial column, also the primary key.
pub const AUTO_NUMBER_COLUMN: &str = "__auto_number";
/// Base column holding the creation timestamp.
pub const CREATED_TIME_COLUMN: &str = "__created_time";
/// Base column holding the last modification timestamp.
pub const LAST_MODIFIED_TIME_COLUMN: &str = "__last_modified_time";
/// Base column holding the creator's user id.
pub const CREATED_BY_COLUMN: &str = "__created_by";
/// Base column holding the last modifier's user id.
pub const LAST_MODIFIED_BY_COLUMN: &str = "__last_modified_by";
/// Base column holding the optimistic-lock version.
pub const VERSION_COLUMN: &str = "__version";

/// Value type a computed field produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellValueType {
    String,
    Number,
    Boolean,
    DateTime,
}

/// Physical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbFieldType {
    Text,
    Real,
    Boolean,
    DateTime,
    Json,
}

impl DbFieldType {
    /// PostgreSQL type name as written in DDL.
    pub fn sql_type(self) -> &'static str {
        match self {
            DbFieldType::Text => "text",
            DbFieldType::Real => "double precision",
            DbFieldType::Boolean => "boolean",
            DbFieldType::DateTime => "timestamp with time zone",
            DbFieldType::Json => "jsonb",
        }
    }

    /// Name reported by `pg_catalog.format_type` for this type.
    pub fn catalog_name(self) -> &'static str {
        self.sql_type()
    }

    /// Storage type for a computed result.
    pub fn for_result(cell_value_type: CellValueType, is_multiple: bool) -> Self {
        if is_multiple {
            return DbFieldType::Json;
        }
        match cell_value_type {
            CellValueType::Number => DbFieldType::Real,
            CellValueType::DateTime => DbFieldType::DateTime,
            CellValueType::Boolean => DbFieldType::Boolean,
            CellValueType::String => DbFieldType::Text,
        }
    }
}

/// Cardinality of a link between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    ManyMany,
    OneMany,
    ManyOne,
    OneOne,
}

/// Formula options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaOptions {
    pub expression: String,
    /// Field ids the expression reads.
    #[serde(default)]
    pub references: Vec<String>,
    pub cell_value_type: CellValueType,
    #[serde(default)]
    pub is_multiple_cell_value: bool,
}

/// Rollup options: aggregate a foreign field through a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupOptions {
    pub link_field_id: String,
    pub foreign_table_id: String,
    pub look_up_field_id: String,
    #[serde(default)]
    pub expression: String,
    pub cell_value_type: CellValueType,
    #[serde(default)]
    pub is_multiple_cell_value: bool,
}

/// Lookup options: project a foreign field through a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupOptions {
    pub link_field_id: String,
    pub foreign_table_id: String,
    pub look_up_field_id: String,
    pub cell_value_type: CellValueType,
    #[serde(default = "default_true")]
    pub is_multiple_cell_value: bool,
}

/// Options shared by conditional rollups and conditional lookups: a foreign
/// field filtered by a condition instead of a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalOptions {
    pub foreign_table_id: String,
    pub look_up_field_id: String,
    /// Foreign field ids the filter condition reads.
    #[serde(default)]
    pub filter_field_ids: Vec<String>,
    #[serde(default)]
    pub expression: String,
    pub cell_value_type: CellValueType,
    #[serde(default)]
    pub is_multiple_cell_value: bool,
}

/// Link options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkOptions {
    pub relationship: Relationship,
    pub foreign_table_id: String,
    /// Physical name of the foreign table ("schema.table").
    pub foreign_db_table_name: String,
    /// Foreign field displayed in the link cell.
    pub lookup_field_id: String,
    /// Table holding the key columns: a junction table, the host table or the
    /// foreign table depending on the relationship.
    pub fk_host_table_name: String,
    pub self_key_name: String,
    pub foreign_key_name: String,
    #[serde(default)]
    pub symmetric_field_id: Option<String>,
    #[serde(default)]
    pub is_one_way: bool,
    #[serde(default)]
    pub has_order_column: bool,
}

impl LinkOptions {
    /// Many-many links and one-way one-many links are stored in a junction table.
    pub fn uses_junction_table(&self) -> bool {
        match self.relationship {
            Relationship::ManyMany => true,
            Relationship::OneMany => self.is_one_way,
            Relationship::ManyOne | Relationship::OneOne => false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Kind of a field, with the options each kind carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    SingleLineText,
    LongText,
    Number,
    Rating,
    Checkbox,
    Date,
    SingleSelect,
    MultipleSelect,
    Attachment,
    User,
    Button,
    AutoNumber,
    CreatedTime,
    LastModifiedTime,
    CreatedBy,
    LastModifiedBy,
    Formula { options: FormulaOptions },
    Rollup { options: RollupOptions },
    ConditionalRollup { options: ConditionalOptions },
    Lookup { options: LookupOptions },
    ConditionalLookup { options: ConditionalOptions },
    Link { options: LinkOptions },
}

impl FieldKind {
    /// Short name used in logs and messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::SingleLineText => "singleLineText",
            FieldKind::LongText => "longText",
            FieldKind::Number => "number",
            FieldKind::Rating => "rating",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Date => "date",
            FieldKind::SingleSelect => "singleSelect",
            FieldKind::MultipleSelect => "multipleSelect",
            FieldKind::Attachment => "attachment",
            FieldKind::User => "user",
            FieldKind::Button => "button",
            FieldKind::AutoNumber => "autoNumber",
            FieldKind::CreatedTime => "createdTime",
            FieldKind::LastModifiedTime => "lastModifiedTime",
            FieldKind::CreatedBy => "createdBy",
            FieldKind::LastModifiedBy => "lastModifiedBy",
            FieldKind::Formula { .. } => "formula",
            FieldKind::Rollup { .. } => "rollup",
            FieldKind::ConditionalRollup { .. } => "conditionalRollup",
            FieldKind::Lookup { .. } => "lookup",
            FieldKind::ConditionalLookup { .. } => "conditionalLookup",
            FieldKind::Link { .. } => "link",
        }
    }

    /// Whether the value is derived rather than entered.
    pub fn is_computed(&self) -> bool {
        matches!(
            self,
            FieldKind::AutoNumber
                | FieldKind::CreatedTime
                | FieldKind::LastModifiedTime
                | FieldKind::CreatedBy
                | FieldKind::LastModifiedBy
                | FieldKind::Formula { .. }
                | FieldKind::Rollup { .. }
                | FieldKind::ConditionalRollup { .. }
                | FieldKind::Lookup { .. }
                | FieldKind::ConditionalLookup { .. }
        )
    }

    /// Base column a system field mirrors, if any.
    pub fn system_source_column(&self) -> Option<&'static str> {
        match self {
            FieldKind::AutoNumber => Some(AUTO_NUMBER_COLUMN),
            FieldKind::CreatedTime => Some(CREATED_TIME_COLUMN),
            FieldKind::LastModifiedTime => Some(LAST_MODIFIED_TIME_COLUMN),
            FieldKind::CreatedBy => Some(CREATED_BY_COLUMN),
            FieldKind::LastModifiedBy => Some(LAST_MODIFIED_BY_COLUMN),
            _ => None,
        }
    }

    /// Physical column type for the field's own column.
    pub fn db_field_type(&self) -> DbFieldType {
        match self {
            FieldKind::SingleLineText
            | FieldKind::LongText
            | FieldKind::SingleSelect
            | FieldKind::CreatedBy
            | FieldKind::LastModifiedBy => DbFieldType::Text,
            FieldKind::Number | FieldKind::Rating | FieldKind::AutoNumber => DbFieldType::Real,
            FieldKind::Checkbox => DbFieldType::Boolean,
            FieldKind::Date | FieldKind::CreatedTime | FieldKind::LastModifiedTime => {
                DbFieldType::DateTime
            }
            FieldKind::MultipleSelect
            | FieldKind::Attachment
            | FieldKind::User
            | FieldKind::Button
            | FieldKind::Link { .. } => DbFieldType::Json,
            FieldKind::Formula { options } => {
                DbFieldType::for_result(options.cell_value_type, options.is_multiple_cell_value)
            }
            FieldKind::Rollup { options } => {
                DbFieldType::for_result(options.cell_value_type, options.is_multiple_cell_value)
            }
            FieldKind::Lookup { options } => {
                DbFieldType::for_result(options.cell_value_type, options.is_multiple_cell_value)
            }
            FieldKind::ConditionalRollup { options } | FieldKind::ConditionalLookup { options } => {
                DbFieldType::for_result(options.cell_value_type, options.is_multiple_cell_value)
            }
        }
    }
}

/// A logical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,
    /// Physical column name; assigned on first insert when absent.
    #[serde(default)]
    pub db_field_name: Option<String>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl Field {
    /// Create a field of the given kind without a physical name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            db_field_name: None,
            not_null: false,
            unique: false,
            kind,
        }
    }

    /// Builder-style physical name assignment.
    pub fn with_db_field_name(mut self, name: impl Into<String>) -> Self {
        self.db_field_name = Some(name.into());
        self
    }

    /// Physical column name, or an invariant error when it was never assigned.
    pub fn require_db_field_name(&self) -> Result<&str> {
        self.db_field_name.as_deref().ok_or_else(|| {
            SchemaError::invariant(format!(
                "Field {} ({}) has no db field name",
                self.id,
                self.kind.name()
            ))
        })
    }

    pub fn is_computed(&self) -> bool {
        self.kind.is_computed()
    }

    pub fn link_options(&self) -> Option<&LinkOptions> {
        match &self.kind {
            FieldKind::Link { options } => Some(options),
            _ => None,
        }
    }
}

/// A logical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    /// Base (tenant) the table belongs to.
    pub base_id: String,
    pub name: String,
    /// Physical name, "schema.table" or "table".
    pub db_table_name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Table {
    /// Physical location of the table.
    pub fn identifier(&self) -> Result<TableIdentifier> {
        TableIdentifier::parse(&self.db_table_name)
    }

    /// Find a field by id.
    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_type_mapping() {
        assert_eq!(DbFieldType::for_result(CellValueType::Number, true), DbFieldType::Json);
        assert_eq!(DbFieldType::for_result(CellValueType::Number, false), DbFieldType::Real);
        assert_eq!(
            DbFieldType::for_result(CellValueType::DateTime, false),
            DbFieldType::DateTime
        );
        assert_eq!(
            DbFieldType::for_result(CellValueType::Boolean, false),
            DbFieldType::Boolean
        );
        assert_eq!(DbFieldType::for_result(CellValueType::String, false), DbFieldType::Text);
    }

    #[test]
    fn test_scalar_type_mapping() {
        assert_eq!(FieldKind::SingleLineText.db_field_type(), DbFieldType::Text);
        assert_eq!(FieldKind::Rating.db_field_type(), DbFieldType::Real);
        assert_eq!(FieldKind::AutoNumber.db_field_type(), DbFieldType::Real);
        assert_eq!(FieldKind::Checkbox.db_field_type(), DbFieldType::Boolean);
        assert_eq!(FieldKind::Date.db_field_type(), DbFieldType::DateTime);
        assert_eq!(FieldKind::Attachment.db_field_type(), DbFieldType::Json);
        assert_eq!(FieldKind::Button.db_field_type(), DbFieldType::Json);
    }

    #[test]
    fn test_junction_strategy_selection() {
        let mut options = LinkOptions {
            relationship: Relationship::ManyMany,
            foreign_table_id: "tblB".into(),
            foreign_db_table_name: "bse.b".into(),
            lookup_field_id: "fldB".into(),
            fk_host_table_name: "bse.junction_fldL".into(),
            self_key_name: "__fk_self".into(),
            foreign_key_name: "__fk_foreign".into(),
            symmetric_field_id: None,
            is_one_way: false,
            has_order_column: false,
        };
        assert!(options.uses_junction_table());
        options.relationship = Relationship::OneMany;
        assert!(!options.uses_junction_table());
        options.is_one_way = true;
        assert!(options.uses_junction_table());
        options.relationship = Relationship::ManyOne;
        assert!(!options.uses_junction_table());
    }

    #[test]
    fn test_field_deserializes_from_yaml() {
        let yaml = r#"
id: fldF
name: Total
type: formula
options:
  expression: "{fldA} + 1"
  references: [fldA]
  cellValueType: number
"#;
        let field: Field = serde_yaml::from_str(yaml).unwrap();
        assert!(field.is_computed());
        assert!(field.db_field_name.is_none());
        assert_eq!(field.kind.db_field_type(), DbFieldType::Real);
    }

    #[test]
    fn test_require_db_field_name() {
        let field = Field::new("fld1", "Name", FieldKind::SingleLineText);
        let err = field.require_db_field_name().unwrap_err();
        assert!(err.to_string().contains("fld1"));
        let field = field.with_db_field_name("name_col");
        assert_eq!(field.require_db_field_name().unwrap(), "name_col");
    }
}
