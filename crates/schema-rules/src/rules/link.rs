//! Link storage rules: indexes, foreign keys and junction tables.

use super::context::SchemaRuleContext;
use super::{ForeignKeyTarget, IndexTarget, JunctionTarget, ValidationResult};
use crate::core::schema::ID_COLUMN;
use crate::core::statement::Statement;
use crate::ddl::{self, ColumnDef};
use crate::error::Result;
use crate::introspect::ConstraintKind;

// -----------------------------------------------------------------------------
// Indexes
// -----------------------------------------------------------------------------

pub(super) fn create_index(target: &IndexTarget) -> Result<Vec<Statement>> {
    let columns: Vec<&str> = target.columns.iter().map(String::as_str).collect();
    let stmt = ddl::create_index(&target.table, &target.name, &columns, target.unique)?;
    if target.guarded {
        return Ok(vec![ddl::guarded(
            &[ddl::table_exists_condition(&target.table)?],
            &stmt.sql,
        )?]);
    }
    Ok(vec![stmt])
}

pub(super) fn drop_index(target: &IndexTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::drop_index(&target.table, &target.name)?])
}

pub(super) async fn validate_index(
    ctx: &SchemaRuleContext<'_>,
    target: &IndexTarget,
) -> Result<ValidationResult> {
    let label = format!("index {} on {}", target.name, target.table);
    let Some(info) = ctx.introspector.index(&target.table, &target.name).await? else {
        return Ok(ValidationResult::missing(label));
    };
    let mut extra = Vec::new();
    if info.columns != target.columns {
        extra.push(format!(
            "{} covers ({}), expected ({})",
            label,
            info.columns.join(", "),
            target.columns.join(", ")
        ));
    }
    if info.is_unique != target.unique {
        extra.push(format!(
            "{} is {}unique",
            label,
            if info.is_unique { "" } else { "not " }
        ));
    }
    Ok(ValidationResult::from_findings(Vec::new(), extra))
}

// -----------------------------------------------------------------------------
// Foreign keys
// -----------------------------------------------------------------------------

/// Always guarded: the referenced table may not exist yet during a batch insert.
pub(super) fn add_foreign_key(target: &ForeignKeyTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::add_foreign_key_guarded(
        &target.table,
        &target.name,
        &target.column,
        &target.referenced,
        &target.referenced_column,
        target.on_delete,
    )?])
}

pub(super) fn drop_foreign_key(target: &ForeignKeyTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::drop_constraint(&target.table, &target.name)?])
}

pub(super) async fn validate_foreign_key(
    ctx: &SchemaRuleContext<'_>,
    target: &ForeignKeyTarget,
) -> Result<ValidationResult> {
    let label = format!("foreign key {} on {}", target.name, target.table);
    let Some(info) = ctx
        .introspector
        .foreign_key(&target.table, &target.name)
        .await?
    else {
        return Ok(ValidationResult::missing(label));
    };
    let mut extra = Vec::new();
    if info.columns != [target.column.as_str()] {
        extra.push(format!("{} covers ({})", label, info.columns.join(", ")));
    }
    match &info.referenced_table {
        Some(referenced) if referenced.same_location(&target.referenced) => {}
        Some(referenced) => extra.push(format!(
            "{} references {}, expected {}",
            label, referenced, target.referenced
        )),
        None => extra.push(format!("{} has no referenced table", label)),
    }
    Ok(ValidationResult::from_findings(Vec::new(), extra))
}

// -----------------------------------------------------------------------------
// Junction tables
// -----------------------------------------------------------------------------

pub(super) fn create_junction(target: &JunctionTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::create_table(
        &target.table,
        &[
            ColumnDef::new(ID_COLUMN, "serial PRIMARY KEY"),
            ColumnDef::new(target.self_key.as_str(), "text"),
            ColumnDef::new(target.foreign_key.as_str(), "text"),
        ],
    )?])
}

pub(super) fn drop_junction(target: &JunctionTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::drop_table(&target.table)?])
}

pub(super) async fn validate_junction(
    ctx: &SchemaRuleContext<'_>,
    target: &JunctionTarget,
) -> Result<ValidationResult> {
    if !ctx.introspector.table_exists(&target.table).await? {
        return Ok(ValidationResult::missing(format!(
            "junction table {}",
            target.table
        )));
    }
    let mut missing = Vec::new();
    for column in [&target.self_key, &target.foreign_key] {
        if !ctx.introspector.column_exists(&target.table, column).await? {
            missing.push(format!("column {}.{}", target.table, column));
        }
    }
    Ok(ValidationResult::from_findings(missing, Vec::new()))
}

fn junction_unique_name(target: &JunctionTarget) -> String {
    ddl::junction_unique_name(&target.self_key, &target.foreign_key)
}

pub(super) fn add_junction_unique(target: &JunctionTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::add_unique_constraint(
        &target.table,
        &junction_unique_name(target),
        &[target.self_key.as_str(), target.foreign_key.as_str()],
    )?])
}

pub(super) fn drop_junction_unique(target: &JunctionTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::drop_constraint(
        &target.table,
        &junction_unique_name(target),
    )?])
}

pub(super) async fn validate_junction_unique(
    ctx: &SchemaRuleContext<'_>,
    target: &JunctionTarget,
) -> Result<ValidationResult> {
    let name = junction_unique_name(target);
    let label = format!("unique constraint {} on {}", name, target.table);
    match ctx.introspector.constraint(&target.table, &name).await? {
        None => Ok(ValidationResult::missing(label)),
        Some(info) if info.kind != ConstraintKind::Unique => {
            Ok(ValidationResult::extra(format!("{} is not a unique constraint", label)))
        }
        Some(info) if info.columns != [target.self_key.as_str(), target.foreign_key.as_str()] => {
            Ok(ValidationResult::extra(format!(
                "{} covers ({})",
                label,
                info.columns.join(", ")
            )))
        }
        Some(_) => Ok(ValidationResult::ok()),
    }
}
