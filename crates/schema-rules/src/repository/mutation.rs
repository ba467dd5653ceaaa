//! Field-level changes to an existing table.
//!
//! [`TableMutation`] describes what changes; [`plan_mutations`] turns a list of
//! them into statements plus the table definition they leave behind, and
//! [`added_fields`] picks out the fields that need a backfill afterwards.

use tracing::debug;

use super::ensure_db_field_name;
use crate::core::schema::{Field, Table};
use crate::core::statement::Statement;
use crate::ddl;
use crate::error::{Result, SchemaError};
use crate::factory::RuleFactory;
use crate::resolver;
use crate::rules::{RuleKind, SchemaRule, SchemaRuleContext};

/// One change to a table's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum TableMutation {
    /// Create a new field.
    AddField { field: Field },
    /// Drop a field and everything it owns.
    RemoveField { field_id: String },
    /// Create `field` and copy the values of `source_field_id` into it.
    DuplicateField { source_field_id: String, field: Field },
    /// Move a field to a new physical column name.
    RenameField { field_id: String, db_field_name: String },
}

impl TableMutation {
    /// Id of the field this mutation creates, if any.
    pub fn added_field_id(&self) -> Option<&str> {
        match self {
            TableMutation::AddField { field } | TableMutation::DuplicateField { field, .. } => {
                Some(&field.id)
            }
            TableMutation::RemoveField { .. } | TableMutation::RenameField { .. } => None,
        }
    }
}

/// Statements for a mutation list and the table they produce.
#[derive(Debug)]
pub struct MutationPlan {
    pub statements: Vec<Statement>,
    pub table: Table,
}

/// Plan `mutations` against `table` in order; later mutations see earlier ones.
pub fn plan_mutations(
    factory: &mut RuleFactory<'_>,
    ctx: &SchemaRuleContext<'_>,
    table: &Table,
    mutations: &[TableMutation],
) -> Result<MutationPlan> {
    let mut working = table.clone();
    let mut statements = Vec::new();

    for mutation in mutations {
        let stmts = match mutation {
            TableMutation::AddField { field } => {
                let field = new_field(&working, field)?;
                let stmts = resolver::up_all(&factory.field_rules(&working, &field)?, ctx)?;
                working.fields.push(field);
                stmts
            }
            TableMutation::RemoveField { field_id } => {
                let index = field_index(&working, field_id)?;
                let field = working.fields.remove(index);
                resolver::down_all(&factory.field_rules(&working, &field)?, ctx)?
            }
            TableMutation::DuplicateField {
                source_field_id,
                field,
            } => {
                let source = working.fields[field_index(&working, source_field_id)?].clone();
                if source.link_options().is_some() {
                    return Err(SchemaError::invariant(format!(
                        "Link field {} cannot be duplicated at the schema level",
                        source.id
                    )));
                }
                let field = new_field(&working, field)?;
                let mut stmts = resolver::up_all(&factory.field_rules(&working, &field)?, ctx)?;
                // Computed values are recomputed by the backfill instead.
                if !source.is_computed() && !field.is_computed() {
                    stmts.push(ddl::copy_column(
                        &working.identifier()?,
                        source.require_db_field_name()?,
                        field.require_db_field_name()?,
                    )?);
                }
                working.fields.push(field);
                stmts
            }
            TableMutation::RenameField {
                field_id,
                db_field_name,
            } => {
                let index = field_index(&working, field_id)?;
                let old = working.fields[index].clone();
                let old_name = old.require_db_field_name()?;
                if old_name == db_field_name {
                    Vec::new()
                } else {
                    let renamed = old.clone().with_db_field_name(db_field_name.clone());
                    let mut stmts =
                        resolver::down_all(&name_bound(factory.field_rules(&working, &old)?), ctx)?;
                    stmts.push(ddl::rename_column(
                        &working.identifier()?,
                        old_name,
                        db_field_name,
                    )?);
                    stmts.extend(resolver::up_all(
                        &name_bound(factory.field_rules(&working, &renamed)?),
                        ctx,
                    )?);
                    working.fields[index] = renamed;
                    stmts
                }
            }
        };
        debug!("{} on {}: {} statements", mutation_name(mutation), table.id, stmts.len());
        statements.extend(stmts);
    }

    Ok(MutationPlan {
        statements,
        table: working,
    })
}

/// Fields created by `mutations`, as they appear in the planned table.
pub fn added_fields(mutations: &[TableMutation], table: &Table) -> Vec<Field> {
    mutations
        .iter()
        .filter_map(TableMutation::added_field_id)
        .filter_map(|id| table.field(id).cloned())
        .collect()
}

fn mutation_name(mutation: &TableMutation) -> &'static str {
    match mutation {
        TableMutation::AddField { .. } => "add",
        TableMutation::RemoveField { .. } => "remove",
        TableMutation::DuplicateField { .. } => "duplicate",
        TableMutation::RenameField { .. } => "rename",
    }
}

fn new_field(table: &Table, field: &Field) -> Result<Field> {
    if table.field(&field.id).is_some() {
        return Err(SchemaError::invariant(format!(
            "Field {} already exists on table {}",
            field.id, table.id
        )));
    }
    let mut field = field.clone();
    ensure_db_field_name(&mut field)?;
    Ok(field)
}

fn field_index(table: &Table, field_id: &str) -> Result<usize> {
    table
        .fields
        .iter()
        .position(|f| f.id == field_id)
        .ok_or_else(|| {
            SchemaError::invariant(format!("Field {} not found on table {}", field_id, table.id))
        })
}

/// Rules whose object names embed the column name and must follow a rename.
fn name_bound(rules: Vec<SchemaRule>) -> Vec<SchemaRule> {
    rules
        .into_iter()
        .filter(|r| matches!(r.kind, RuleKind::UniqueColumn(_)))
        .collect()
}
