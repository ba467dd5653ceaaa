//! Field → rules mapping.
//!
//! [`RuleFactory`] turns each field into the set of [`SchemaRule`]s that
//! describe its physical footprint. The match over [`FieldKind`] is exhaustive:
//! adding a kind fails to compile until it is mapped here.

use tracing::debug;

use crate::core::identifier::TableIdentifier;
use crate::core::policy::PersistencePolicy;
use crate::core::schema::{DbFieldType, Field, FieldKind, LinkOptions, Relationship, Table, ID_COLUMN};
use crate::ddl::{self, ReferentialAction};
use crate::error::Result;
use crate::rules::{
    ColumnTarget, ForeignKeyTarget, IndexTarget, JunctionTarget, RuleKind, SchemaRule,
};

/// Key set in a field's `meta` when its link persists a manual order.
pub const HAS_ORDER_COLUMN_META: &str = "hasOrderColumn";

/// Order column name inside a junction table.
pub const JUNCTION_ORDER_COLUMN: &str = "__order";

/// Hands out unique qualifiers for rules a field may own several of.
#[derive(Debug, Default)]
pub struct RuleIdGenerator {
    next: usize,
}

impl RuleIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{prefix}:{n}` with `n` increasing across the generator's lifetime.
    pub fn next_qualifier(&mut self, prefix: &str) -> String {
        let n = self.next;
        self.next += 1;
        format!("{}:{}", prefix, n)
    }
}

/// Whether a field of this kind may carry `NOT NULL`.
pub fn supports_not_null(kind: &FieldKind) -> bool {
    !kind.is_computed() && !matches!(kind, FieldKind::Button | FieldKind::Link { .. })
}

/// Whether a field of this kind may carry a unique index.
pub fn supports_unique(kind: &FieldKind) -> bool {
    !kind.is_computed()
        && kind.db_field_type() != DbFieldType::Json
        && !matches!(kind, FieldKind::Checkbox)
}

/// Builds rules for fields of one logical operation.
#[derive(Debug)]
pub struct RuleFactory<'a> {
    policy: &'a PersistencePolicy,
    ids: RuleIdGenerator,
}

impl<'a> RuleFactory<'a> {
    pub fn new(policy: &'a PersistencePolicy) -> Self {
        Self {
            policy,
            ids: RuleIdGenerator::new(),
        }
    }

    /// Rules for every field of the table, in field order.
    pub fn table_rules(&mut self, table: &Table) -> Result<Vec<SchemaRule>> {
        let mut rules = Vec::new();
        for field in &table.fields {
            rules.extend(self.field_rules(table, field)?);
        }
        Ok(rules)
    }

    /// Rules for one field.
    ///
    /// Fails with an invariant error when the field has no physical name or a
    /// table name cannot be parsed.
    pub fn field_rules(&mut self, table: &Table, field: &Field) -> Result<Vec<SchemaRule>> {
        let host = table.identifier()?;
        let column = field.require_db_field_name()?;
        let db_type = field.kind.db_field_type();

        let rules = match &field.kind {
            FieldKind::SingleLineText
            | FieldKind::LongText
            | FieldKind::Number
            | FieldKind::Rating
            | FieldKind::Checkbox
            | FieldKind::Date
            | FieldKind::SingleSelect
            | FieldKind::MultipleSelect
            | FieldKind::Attachment
            | FieldKind::User
            | FieldKind::Button => column_bundle(field, &host, column, db_type),
            FieldKind::AutoNumber
            | FieldKind::CreatedTime
            | FieldKind::LastModifiedTime
            | FieldKind::CreatedBy
            | FieldKind::LastModifiedBy => match field.kind.system_source_column() {
                Some(source) if self.policy.uses_generated_column(&field.kind) => {
                    vec![generated_rule(field, &host, column, db_type, source)]
                }
                _ => column_bundle(field, &host, column, db_type),
            },
            FieldKind::Formula { options } => {
                let mut rules = column_bundle(field, &host, column, db_type);
                rules.push(self.reference_rule(field, options.references.clone()));
                rules
            }
            FieldKind::Rollup { options } => {
                let mut rules = column_bundle(field, &host, column, db_type);
                rules.push(self.reference_rule(
                    field,
                    vec![options.link_field_id.clone(), options.look_up_field_id.clone()],
                ));
                rules
            }
            FieldKind::Lookup { options } => {
                let mut rules = column_bundle(field, &host, column, db_type);
                rules.push(self.reference_rule(
                    field,
                    vec![options.link_field_id.clone(), options.look_up_field_id.clone()],
                ));
                rules
            }
            FieldKind::ConditionalRollup { options } | FieldKind::ConditionalLookup { options } => {
                let mut rules = column_bundle(field, &host, column, db_type);
                let mut sources = vec![options.look_up_field_id.clone()];
                sources.extend(options.filter_field_ids.iter().cloned());
                rules.push(self.reference_rule(field, sources));
                rules
            }
            FieldKind::Link { options } => self.link_rules(table, field, &host, column, options)?,
        };

        debug!(
            "Built {} rules for field {} ({})",
            rules.len(),
            field.id,
            field.kind.name()
        );
        Ok(rules)
    }

    /// Emitted even without sources: `up` then only prunes stale edges and
    /// `down` still clears edges where the field is the source.
    fn reference_rule(&mut self, field: &Field, sources: Vec<String>) -> SchemaRule {
        let qualifier = self.ids.next_qualifier("references");
        SchemaRule::new(
            &field.id,
            &qualifier,
            format!("Reference edges into {}", field.name),
            RuleKind::Reference {
                field_id: field.id.clone(),
                sources,
            },
        )
    }

    fn link_rules(
        &mut self,
        table: &Table,
        field: &Field,
        host: &TableIdentifier,
        column: &str,
        options: &LinkOptions,
    ) -> Result<Vec<SchemaRule>> {
        let foreign = TableIdentifier::parse(&options.foreign_db_table_name)?;
        let fk_host = TableIdentifier::parse(&options.fk_host_table_name)?;

        let mut rules = vec![SchemaRule::new(
            &field.id,
            "link_value_column",
            format!("Display value cache for link {}", field.name),
            RuleKind::LinkValueColumn(ColumnTarget {
                table: host.clone(),
                column: column.to_string(),
                db_type: DbFieldType::Json,
                guarded: false,
            }),
        )];

        let storage = if options.uses_junction_table() {
            self.junction_rules(field, host, &foreign, fk_host, options)
        } else {
            fk_column_rules(field, host, foreign, fk_host, options)
        };
        let order_rule = storage.iter().find(|r| matches!(r.kind, RuleKind::OrderColumn(_)));
        let meta_rule = order_rule.map(|order| {
            SchemaRule::new(
                &field.id,
                "meta_order",
                format!("Order flag on field record {}", field.id),
                RuleKind::FieldMeta {
                    field_id: field.id.clone(),
                    key: HAS_ORDER_COLUMN_META.to_string(),
                    value: true,
                },
            )
            .optional()
            .depends_on(order.id.clone())
        });
        rules.extend(storage);
        rules.extend(meta_rule);
        rules.push(self.reference_rule(field, vec![options.lookup_field_id.clone()]));

        if let Some(symmetric) = options.symmetric_field_id.as_ref().filter(|_| !options.is_one_way) {
            rules.push(SchemaRule::new(
                &field.id,
                "symmetric",
                format!("Symmetric counterpart {} of link {}", symmetric, field.name),
                RuleKind::LinkSymmetricField {
                    field_id: field.id.clone(),
                    table_id: table.id.clone(),
                    foreign_table_id: options.foreign_table_id.clone(),
                    symmetric_field_id: symmetric.clone(),
                },
            ));
        }
        Ok(rules)
    }

    fn junction_rules(
        &self,
        field: &Field,
        host: &TableIdentifier,
        foreign: &TableIdentifier,
        junction: TableIdentifier,
        options: &LinkOptions,
    ) -> Vec<SchemaRule> {
        let target = JunctionTarget {
            table: junction.clone(),
            self_key: options.self_key_name.clone(),
            foreign_key: options.foreign_key_name.clone(),
        };
        let table_rule = SchemaRule::new(
            &field.id,
            "junction_table",
            format!("Junction table {}", junction),
            RuleKind::JunctionTable(target.clone()),
        );
        let table_id = table_rule.id.clone();
        let mut rules = vec![
            table_rule,
            SchemaRule::new(
                &field.id,
                "junction_unique",
                format!("Unique key pairs in {}", junction),
                RuleKind::JunctionUnique(target),
            )
            .depends_on(table_id.clone()),
        ];

        let keys = [
            ("self", &options.self_key_name, host),
            ("foreign", &options.foreign_key_name, foreign),
        ];
        if self.policy.junction_secondary_indexes(options) {
            for (side, key, _) in keys {
                rules.push(
                    SchemaRule::new(
                        &field.id,
                        &format!("junction_index_{}", side),
                        format!("Index on {}.{}", junction, key),
                        RuleKind::Index(IndexTarget {
                            table: junction.clone(),
                            name: ddl::index_name(key),
                            columns: vec![key.clone()],
                            unique: false,
                            guarded: false,
                        }),
                    )
                    .depends_on(table_id.clone()),
                );
            }
        }
        for (side, key, referenced) in keys {
            rules.push(
                SchemaRule::new(
                    &field.id,
                    &format!("fk_junction_{}", side),
                    format!("Foreign key {}.{} -> {}", junction, key, referenced),
                    RuleKind::ForeignKey(ForeignKeyTarget {
                        table: junction.clone(),
                        name: ddl::foreign_key_name(key),
                        column: key.clone(),
                        referenced: referenced.clone(),
                        referenced_column: ID_COLUMN.to_string(),
                        on_delete: ReferentialAction::Cascade,
                    }),
                )
                .optional()
                .depends_on(table_id.clone()),
            );
        }

        if options.has_order_column {
            rules.push(
                SchemaRule::new(
                    &field.id,
                    "junction_order_column",
                    format!("Order column in {}", junction),
                    RuleKind::OrderColumn(ColumnTarget {
                        table: junction,
                        column: JUNCTION_ORDER_COLUMN.to_string(),
                        db_type: DbFieldType::Real,
                        guarded: false,
                    }),
                )
                .depends_on(table_id),
            );
        }
        rules
    }
}

fn column_bundle(
    field: &Field,
    host: &TableIdentifier,
    column: &str,
    db_type: DbFieldType,
) -> Vec<SchemaRule> {
    let column_rule = SchemaRule::new(
        &field.id,
        "column",
        format!("Column {} for field {}", column, field.name),
        RuleKind::Column(ColumnTarget {
            table: host.clone(),
            column: column.to_string(),
            db_type,
            guarded: false,
        }),
    );
    let column_id = column_rule.id.clone();
    let mut rules = vec![column_rule];

    if field.not_null && supports_not_null(&field.kind) {
        rules.push(
            SchemaRule::new(
                &field.id,
                "not_null",
                format!("{} is NOT NULL", column),
                RuleKind::NotNull {
                    table: host.clone(),
                    column: column.to_string(),
                },
            )
            .depends_on(column_id.clone()),
        );
    }
    if field.unique && supports_unique(&field.kind) {
        rules.push(
            SchemaRule::new(
                &field.id,
                "unique",
                format!("{} is unique", column),
                RuleKind::UniqueColumn(IndexTarget {
                    table: host.clone(),
                    name: ddl::unique_index_name(&host.table_name, column),
                    columns: vec![column.to_string()],
                    unique: true,
                    guarded: false,
                }),
            )
            .depends_on(column_id),
        );
    }
    rules
}

fn generated_rule(
    field: &Field,
    host: &TableIdentifier,
    column: &str,
    db_type: DbFieldType,
    source: &str,
) -> SchemaRule {
    SchemaRule::new(
        &field.id,
        "generated_column",
        format!("{} generated from {}", column, source),
        RuleKind::GeneratedColumn {
            target: ColumnTarget {
                table: host.clone(),
                column: column.to_string(),
                db_type,
                guarded: false,
            },
            source_column: source.to_string(),
        },
    )
}

/// Key column on the fk host table.
///
/// A foreign key name of `__id` means the host is the foreign table and the
/// key column points back at this table.
fn fk_column_rules(
    field: &Field,
    host: &TableIdentifier,
    foreign: TableIdentifier,
    fk_host: TableIdentifier,
    options: &LinkOptions,
) -> Vec<SchemaRule> {
    let (column, referenced) = if options.foreign_key_name == ID_COLUMN {
        (options.self_key_name.clone(), host.clone())
    } else {
        (options.foreign_key_name.clone(), foreign)
    };
    let guarded = !fk_host.same_location(host);

    let column_rule = SchemaRule::new(
        &field.id,
        "fk_column",
        format!("Key column {}.{}", fk_host, column),
        RuleKind::FkColumn(ColumnTarget {
            table: fk_host.clone(),
            column: column.clone(),
            db_type: DbFieldType::Text,
            guarded,
        }),
    );
    let column_id = column_rule.id.clone();
    let mut rules = vec![column_rule];

    let (qualifier, index) = if options.relationship == Relationship::OneOne {
        (
            "fk_unique_index",
            IndexTarget {
                table: fk_host.clone(),
                name: ddl::unique_index_name(&fk_host.table_name, &column),
                columns: vec![column.clone()],
                unique: true,
                guarded,
            },
        )
    } else {
        (
            "fk_index",
            IndexTarget {
                table: fk_host.clone(),
                name: ddl::index_name(&column),
                columns: vec![column.clone()],
                unique: false,
                guarded,
            },
        )
    };
    rules.push(
        SchemaRule::new(
            &field.id,
            qualifier,
            format!("Index {} on {}", index.name, fk_host),
            RuleKind::Index(index),
        )
        .depends_on(column_id.clone()),
    );
    rules.push(
        SchemaRule::new(
            &field.id,
            "fk_constraint",
            format!("Foreign key {}.{} -> {}", fk_host, column, referenced),
            RuleKind::ForeignKey(ForeignKeyTarget {
                table: fk_host.clone(),
                name: ddl::foreign_key_name(&column),
                column: column.clone(),
                referenced,
                referenced_column: ID_COLUMN.to_string(),
                on_delete: ReferentialAction::SetNull,
            }),
        )
        .optional()
        .depends_on(column_id.clone()),
    );

    if options.has_order_column {
        rules.push(
            SchemaRule::new(
                &field.id,
                "fk_order_column",
                format!("Order column for {}.{}", fk_host, column),
                RuleKind::OrderColumn(ColumnTarget {
                    table: fk_host,
                    column: format!("{}_order", column),
                    db_type: DbFieldType::Real,
                    guarded,
                }),
            )
            .depends_on(column_id),
        );
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{CellValueType, FormulaOptions, LookupOptions};

    fn table(fields: Vec<Field>) -> Table {
        Table {
            id: "tblA".into(),
            base_id: "bse".into(),
            name: "A".into(),
            db_table_name: "bse.a".into(),
            fields,
        }
    }

    fn link(relationship: Relationship, is_one_way: bool) -> LinkOptions {
        LinkOptions {
            relationship,
            foreign_table_id: "tblB".into(),
            foreign_db_table_name: "bse.b".into(),
            lookup_field_id: "fldBName".into(),
            fk_host_table_name: "bse.a".into(),
            self_key_name: "__id".into(),
            foreign_key_name: "__fk_fldL".into(),
            symmetric_field_id: Some("fldS".into()),
            is_one_way,
            has_order_column: false,
        }
    }

    fn ids(rules: &[SchemaRule]) -> Vec<&str> {
        rules.iter().map(|r| r.qualifier()).collect()
    }

    fn build(field: Field) -> Vec<SchemaRule> {
        let policy = PersistencePolicy::default();
        let t = table(vec![field.clone()]);
        RuleFactory::new(&policy).field_rules(&t, &field).unwrap()
    }

    // =========================================================================
    // Scalar and computed fields
    // =========================================================================

    #[test]
    fn test_scalar_field_spawns_capability_children() {
        let mut field = Field::new("fldN", "Name", FieldKind::SingleLineText).with_db_field_name("name");
        field.not_null = true;
        field.unique = true;
        let rules = build(field);
        assert_eq!(ids(&rules), vec!["column", "not_null", "unique"]);
        assert_eq!(rules[1].dependencies, vec!["fldN:column".to_string()]);
        match &rules[2].kind {
            RuleKind::UniqueColumn(index) => assert_eq!(index.name, "a_name_unique"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_capabilities_exclude_checkbox_json_and_computed() {
        assert!(!supports_unique(&FieldKind::Checkbox));
        assert!(!supports_unique(&FieldKind::MultipleSelect));
        assert!(!supports_unique(&FieldKind::CreatedTime));
        assert!(supports_unique(&FieldKind::Rating));
        assert!(supports_not_null(&FieldKind::Checkbox));
        assert!(!supports_not_null(&FieldKind::AutoNumber));

        let mut field = Field::new("fldC", "Done", FieldKind::Checkbox).with_db_field_name("done");
        field.unique = true;
        assert_eq!(ids(&build(field)), vec!["column"]);
    }

    #[test]
    fn test_formula_gets_reference_rule() {
        let field = Field::new(
            "fldF",
            "Total",
            FieldKind::Formula {
                options: FormulaOptions {
                    expression: "{fldA} + {fldB}".into(),
                    references: vec!["fldA".into(), "fldB".into()],
                    cell_value_type: CellValueType::Number,
                    is_multiple_cell_value: false,
                },
            },
        )
        .with_db_field_name("total");
        let rules = build(field);
        assert_eq!(ids(&rules), vec!["column", "references:0"]);
        match &rules[1].kind {
            RuleKind::Reference { sources, .. } => assert_eq!(sources.len(), 2),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_formula_without_references_keeps_reference_rule() {
        let field = Field::new(
            "fldConst",
            "Const",
            FieldKind::Formula {
                options: FormulaOptions {
                    expression: "1".into(),
                    references: vec!["fldConst".into()],
                    cell_value_type: CellValueType::Number,
                    is_multiple_cell_value: false,
                },
            },
        )
        .with_db_field_name("const");
        assert_eq!(ids(&build(field)), vec!["column", "references:0"]);
    }

    #[test]
    fn test_reference_ids_are_unique_across_fields() {
        let policy = PersistencePolicy::default();
        let lookup = |id: &str| {
            Field::new(
                id,
                id,
                FieldKind::Lookup {
                    options: LookupOptions {
                        link_field_id: "fldL".into(),
                        foreign_table_id: "tblB".into(),
                        look_up_field_id: "fldX".into(),
                        cell_value_type: CellValueType::String,
                        is_multiple_cell_value: true,
                    },
                },
            )
            .with_db_field_name(id)
        };
        let t = table(vec![lookup("fld1"), lookup("fld2")]);
        let rules = RuleFactory::new(&policy).table_rules(&t).unwrap();
        let refs: Vec<&str> = rules
            .iter()
            .filter(|r| r.kind.name() == "reference")
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(refs, vec!["fld1:references:0", "fld2:references:1"]);
    }

    #[test]
    fn test_system_field_follows_generated_policy() {
        let field = Field::new("fldT", "Created", FieldKind::CreatedTime).with_db_field_name("created");
        assert_eq!(ids(&build(field.clone())), vec!["column"]);

        let policy = PersistencePolicy {
            generated_system_columns: true,
        };
        let t = table(vec![field.clone()]);
        let rules = RuleFactory::new(&policy).field_rules(&t, &field).unwrap();
        assert_eq!(ids(&rules), vec!["generated_column"]);
    }

    #[test]
    fn test_missing_db_field_name_is_invariant_error() {
        let policy = PersistencePolicy::default();
        let field = Field::new("fldN", "Name", FieldKind::SingleLineText);
        let t = table(vec![field.clone()]);
        let err = RuleFactory::new(&policy).field_rules(&t, &field).unwrap_err();
        assert!(matches!(err, crate::error::SchemaError::Invariant(_)));
    }

    // =========================================================================
    // Link fields
    // =========================================================================

    #[test]
    fn test_many_one_link_uses_fk_column() {
        let field = Field::new(
            "fldL",
            "Owner",
            FieldKind::Link {
                options: link(Relationship::ManyOne, false),
            },
        )
        .with_db_field_name("owner");
        let rules = build(field);
        assert_eq!(
            ids(&rules),
            vec![
                "link_value_column",
                "fk_column",
                "fk_index",
                "fk_constraint",
                "references:0",
                "symmetric"
            ]
        );
        match &rules[3].kind {
            RuleKind::ForeignKey(fk) => {
                assert_eq!(fk.column, "__fk_fldL");
                assert_eq!(fk.referenced.to_string(), "bse.b");
                assert_eq!(fk.on_delete, ReferentialAction::SetNull);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(!rules[3].required);
        match &rules[1].kind {
            RuleKind::FkColumn(col) => assert!(!col.guarded),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_one_many_two_way_keys_foreign_table() {
        let mut options = link(Relationship::OneMany, false);
        options.fk_host_table_name = "bse.b".into();
        options.self_key_name = "__fk_fldS".into();
        options.foreign_key_name = "__id".into();
        options.has_order_column = true;
        let field = Field::new("fldL", "Items", FieldKind::Link { options }).with_db_field_name("items");
        let rules = build(field);
        assert_eq!(
            ids(&rules),
            vec![
                "link_value_column",
                "fk_column",
                "fk_index",
                "fk_constraint",
                "fk_order_column",
                "meta_order",
                "references:0",
                "symmetric"
            ]
        );
        match &rules[1].kind {
            RuleKind::FkColumn(col) => {
                assert_eq!(col.table.to_string(), "bse.b");
                assert_eq!(col.column, "__fk_fldS");
                assert!(col.guarded);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &rules[3].kind {
            RuleKind::ForeignKey(fk) => assert_eq!(fk.referenced.to_string(), "bse.a"),
            other => panic!("unexpected kind {:?}", other),
        }
        match &rules[4].kind {
            RuleKind::OrderColumn(col) => assert_eq!(col.column, "__fk_fldS_order"),
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(rules[5].dependencies, vec!["fldL:fk_order_column".to_string()]);
        assert!(!rules[5].required);
    }

    #[test]
    fn test_one_one_link_uses_unique_index() {
        let field = Field::new(
            "fldL",
            "Partner",
            FieldKind::Link {
                options: link(Relationship::OneOne, false),
            },
        )
        .with_db_field_name("partner");
        let rules = build(field);
        assert!(ids(&rules).contains(&"fk_unique_index"));
    }

    #[test]
    fn test_many_many_link_uses_junction_with_indexes() {
        let mut options = link(Relationship::ManyMany, false);
        options.fk_host_table_name = "bse.junction_fldL_fldS".into();
        options.self_key_name = "__fk_fldS".into();
        options.foreign_key_name = "__fk_fldL".into();
        options.has_order_column = true;
        let field = Field::new("fldL", "Tags", FieldKind::Link { options }).with_db_field_name("tags");
        let rules = build(field);
        assert_eq!(
            ids(&rules),
            vec![
                "link_value_column",
                "junction_table",
                "junction_unique",
                "junction_index_self",
                "junction_index_foreign",
                "fk_junction_self",
                "fk_junction_foreign",
                "junction_order_column",
                "meta_order",
                "references:0",
                "symmetric"
            ]
        );
        match &rules[5].kind {
            RuleKind::ForeignKey(fk) => {
                assert_eq!(fk.referenced.to_string(), "bse.a");
                assert_eq!(fk.on_delete, ReferentialAction::Cascade);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_one_way_one_many_junction_skips_indexes_and_symmetric() {
        let mut options = link(Relationship::OneMany, true);
        options.fk_host_table_name = "bse.junction_fldL".into();
        options.self_key_name = "__fk_fldS".into();
        options.foreign_key_name = "__fk_fldL".into();
        let field = Field::new("fldL", "Refs", FieldKind::Link { options }).with_db_field_name("refs");
        let rules = build(field);
        assert_eq!(
            ids(&rules),
            vec![
                "link_value_column",
                "junction_table",
                "junction_unique",
                "fk_junction_self",
                "fk_junction_foreign",
                "references:0"
            ]
        );
    }

    #[test]
    fn test_malformed_foreign_table_name() {
        let mut options = link(Relationship::ManyOne, false);
        options.foreign_db_table_name = "a.b.c".into();
        let policy = PersistencePolicy::default();
        let field = Field::new("fldL", "Bad", FieldKind::Link { options }).with_db_field_name("bad");
        let t = table(vec![field.clone()]);
        assert!(RuleFactory::new(&policy).field_rules(&t, &field).is_err());
    }
}
