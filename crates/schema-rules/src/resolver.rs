//! Dependency ordering of rule batches.
//!
//! Rules name their prerequisites by id. [`resolve`] orders a batch so every
//! rule comes after its in-batch dependencies (Kahn's algorithm, seeded in input
//! order so the result is deterministic). Dependencies on ids outside the batch
//! are treated as already satisfied.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::core::statement::Statement;
use crate::error::{Result, SchemaError};
use crate::rules::{SchemaRule, SchemaRuleContext, ValidationResult};

/// Order a batch of rules by dependency.
///
/// Fails with [`SchemaError::DependencyCycle`] naming every rule that could not
/// be ordered, and with an invariant error when two rules share an id.
pub fn resolve(rules: &[SchemaRule]) -> Result<Vec<&SchemaRule>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(rules.len());
    for (i, rule) in rules.iter().enumerate() {
        if index.insert(rule.id.as_str(), i).is_some() {
            return Err(SchemaError::invariant(format!(
                "Duplicate rule id {} in batch",
                rule.id
            )));
        }
    }

    let mut in_degree = vec![0usize; rules.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
    for (i, rule) in rules.iter().enumerate() {
        for dep in &rule.dependencies {
            if let Some(&parent) = index.get(dep.as_str()) {
                dependents[parent].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..rules.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(rules.len());
    while let Some(i) = queue.pop_front() {
        ordered.push(&rules[i]);
        for &child in &dependents[i] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if ordered.len() != rules.len() {
        let ids = rules
            .iter()
            .zip(&in_degree)
            .filter(|(_, degree)| **degree > 0)
            .map(|(rule, _)| rule.id.clone())
            .collect();
        return Err(SchemaError::DependencyCycle { ids });
    }

    debug!("Resolved {} rules", ordered.len());
    Ok(ordered)
}

/// Creation statements for a batch, in dependency order.
pub fn up_all(rules: &[SchemaRule], ctx: &SchemaRuleContext<'_>) -> Result<Vec<Statement>> {
    let mut stmts = Vec::new();
    for rule in resolve(rules)? {
        stmts.extend(rule.up(ctx)?);
    }
    Ok(stmts)
}

/// Removal statements for a batch, dependents first.
pub fn down_all(rules: &[SchemaRule], ctx: &SchemaRuleContext<'_>) -> Result<Vec<Statement>> {
    let mut stmts = Vec::new();
    for rule in resolve(rules)?.into_iter().rev() {
        stmts.extend(rule.down(ctx)?);
    }
    Ok(stmts)
}

/// Validate every rule in dependency order, keyed by rule id.
pub async fn validate_all(
    rules: &[SchemaRule],
    ctx: &SchemaRuleContext<'_>,
) -> Result<Vec<(String, ValidationResult)>> {
    let mut results = Vec::with_capacity(rules.len());
    for rule in resolve(rules)? {
        results.push((rule.id.clone(), rule.is_valid(ctx).await?));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::TableIdentifier;
    use crate::core::policy::{MetadataTables, PersistencePolicy};
    use crate::core::schema::{
        CellValueType, DbFieldType, Field, FieldKind, FormulaOptions, LinkOptions, Relationship,
        Table,
    };
    use crate::factory::RuleFactory;
    use crate::introspect::{ColumnInfo, MemoryIntrospector};
    use crate::rules::{ColumnTarget, RuleKind};

    fn rule(id: &str, deps: &[&str]) -> SchemaRule {
        let mut rule = SchemaRule::new(
            "fld",
            id,
            id,
            RuleKind::Column(ColumnTarget {
                table: TableIdentifier::new("bse", "tbl"),
                column: id.to_string(),
                db_type: DbFieldType::Text,
                guarded: false,
            }),
        );
        for dep in deps {
            rule = rule.depends_on(format!("fld:{}", dep));
        }
        rule
    }

    fn order(rules: &[SchemaRule]) -> Vec<&str> {
        resolve(rules).unwrap().iter().map(|r| r.qualifier()).collect()
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn test_independent_rules_keep_input_order() {
        let rules = vec![rule("c", &[]), rule("a", &[]), rule("b", &[])];
        assert_eq!(order(&rules), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dependencies_come_first_in_any_permutation() {
        let base = [rule("a", &[]), rule("b", &["a"]), rule("c", &["b"])];
        let permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for perm in permutations {
            let rules: Vec<SchemaRule> = perm.iter().map(|&i| base[i].clone()).collect();
            assert_eq!(order(&rules), vec!["a", "b", "c"], "permutation {:?}", perm);
        }
    }

    #[test]
    fn test_diamond() {
        let rules = vec![
            rule("d", &["b", "c"]),
            rule("b", &["a"]),
            rule("c", &["a"]),
            rule("a", &[]),
        ];
        assert_eq!(order(&rules), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_out_of_batch_dependency_is_satisfied() {
        let rules = vec![rule("b", &["missing"]), rule("a", &[])];
        assert_eq!(order(&rules), vec!["b", "a"]);
    }

    #[test]
    fn test_three_cycle_names_all_members() {
        let rules = vec![
            rule("free", &[]),
            rule("a", &["c"]),
            rule("b", &["a"]),
            rule("c", &["b"]),
        ];
        match resolve(&rules).unwrap_err() {
            SchemaError::DependencyCycle { ids } => {
                assert_eq!(ids, vec!["fld:a", "fld:b", "fld:c"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rules = vec![rule("a", &[]), rule("a", &[])];
        assert!(matches!(resolve(&rules), Err(SchemaError::Invariant(_))));
    }

    // =========================================================================
    // Folding
    // =========================================================================

    #[test]
    fn test_up_and_down_are_mirrored() {
        let catalog = MemoryIntrospector::new();
        let metadata = MetadataTables::default();
        let ctx = SchemaRuleContext::new(&catalog, &metadata);
        let rules = vec![rule("b", &["a"]), rule("a", &[])];

        let up = up_all(&rules, &ctx).unwrap();
        let down = down_all(&rules, &ctx).unwrap();
        assert_eq!(up.len(), down.len());
        assert!(up[0].sql.contains("\"a\""));
        assert!(down[0].sql.contains("\"b\""));
    }

    fn link_field(id: &str, relationship: Relationship, fk_host: &str, keys: (&str, &str)) -> Field {
        Field::new(
            id,
            id,
            FieldKind::Link {
                options: LinkOptions {
                    relationship,
                    foreign_table_id: "tblB".into(),
                    foreign_db_table_name: "bse.b".into(),
                    lookup_field_id: "fldBName".into(),
                    fk_host_table_name: fk_host.into(),
                    self_key_name: keys.0.into(),
                    foreign_key_name: keys.1.into(),
                    symmetric_field_id: None,
                    is_one_way: true,
                    has_order_column: true,
                },
            },
        )
        .with_db_field_name(id.to_lowercase())
    }

    #[test]
    fn test_every_rule_kind_mirrors_statement_count() {
        let mut title = Field::new("fldTitle", "Title", FieldKind::SingleLineText)
            .with_db_field_name("title");
        title.not_null = true;
        title.unique = true;
        let formula = Field::new(
            "fldTotal",
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
        let table = Table {
            id: "tblA".into(),
            base_id: "bse".into(),
            name: "A".into(),
            db_table_name: "bse.a".into(),
            fields: vec![
                title,
                formula,
                link_field("fldOwner", Relationship::ManyOne, "bse.a", ("__id", "__fk_fldOwner")),
                link_field(
                    "fldTags",
                    Relationship::ManyMany,
                    "bse.junction_fldTags",
                    ("__fk_self", "__fk_fldTags"),
                ),
            ],
        };
        let policy = PersistencePolicy::default();
        let rules = RuleFactory::new(&policy).table_rules(&table).unwrap();

        let catalog = MemoryIntrospector::new();
        let metadata = MetadataTables::default();
        let ctx = SchemaRuleContext::new(&catalog, &metadata);

        let mut kinds: Vec<&str> = rules.iter().map(|r| r.kind.name()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        for kind in [
            "column",
            "not_null",
            "unique",
            "fk_column",
            "index",
            "foreign_key",
            "order_column",
            "junction_table",
            "junction_unique",
            "field_meta",
            "reference",
        ] {
            assert!(kinds.contains(&kind), "no {} rule in {:?}", kind, kinds);
        }

        for rule in &rules {
            let up = rule.up(&ctx).unwrap();
            let down = rule.down(&ctx).unwrap();
            assert_eq!(up.len(), down.len(), "{} ({})", rule.id, rule.kind.name());
        }
        assert_eq!(
            up_all(&rules, &ctx).unwrap().len(),
            down_all(&rules, &ctx).unwrap().len()
        );
    }

    #[test]
    fn test_cycle_aborts_fold() {
        let catalog = MemoryIntrospector::new();
        let metadata = MetadataTables::default();
        let ctx = SchemaRuleContext::new(&catalog, &metadata);
        let rules = vec![rule("a", &["b"]), rule("b", &["a"])];
        assert!(up_all(&rules, &ctx).is_err());
    }

    #[tokio::test]
    async fn test_validate_all_in_order() {
        let catalog = MemoryIntrospector::new();
        let metadata = MetadataTables::default();
        let ctx = SchemaRuleContext::new(&catalog, &metadata);
        catalog.add_column(&TableIdentifier::new("bse", "tbl"), "a", ColumnInfo::nullable("text"));
        let rules = vec![rule("b", &["a"]), rule("a", &[])];

        let results = validate_all(&rules, &ctx).await.unwrap();
        assert_eq!(results[0].0, "fld:a");
        assert!(results[0].1.valid);
        assert_eq!(results[1].0, "fld:b");
        assert!(!results[1].1.valid);
    }
}
