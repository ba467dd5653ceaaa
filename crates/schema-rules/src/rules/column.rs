//! Column-shaped rules: value columns, NOT NULL, generated columns.

use super::context::{ApplyMode, SchemaRuleContext};
use super::{ColumnTarget, ValidationResult};
use crate::core::identifier::TableIdentifier;
use crate::core::statement::Statement;
use crate::ddl;
use crate::error::Result;

fn describe(table: &TableIdentifier, column: &str) -> String {
    format!("column {}.{}", table, column)
}

pub(super) fn add(target: &ColumnTarget) -> Result<Vec<Statement>> {
    let stmt = ddl::add_column(&target.table, &target.column, target.db_type.sql_type())?;
    if target.guarded {
        return Ok(vec![ddl::guarded(
            &[ddl::table_exists_condition(&target.table)?],
            &stmt.sql,
        )?]);
    }
    Ok(vec![stmt])
}

pub(super) fn drop(target: &ColumnTarget) -> Result<Vec<Statement>> {
    Ok(vec![ddl::drop_column(&target.table, &target.column)?])
}

/// Generated columns cannot be altered in place, so an existing table gets the
/// column dropped and re-added.
pub(super) fn add_generated(
    target: &ColumnTarget,
    source_column: &str,
    mode: ApplyMode,
) -> Result<Vec<Statement>> {
    let add = ddl::add_generated_column(
        &target.table,
        &target.column,
        target.db_type.sql_type(),
        source_column,
    )?;
    match mode {
        ApplyMode::CreateTable => Ok(vec![add]),
        ApplyMode::AlterTable => Ok(vec![
            ddl::drop_column(&target.table, &target.column)?,
            add,
        ]),
    }
}

pub(super) fn set_not_null(table: &TableIdentifier, column: &str) -> Result<Vec<Statement>> {
    Ok(vec![ddl::set_not_null(table, column)?])
}

pub(super) fn drop_not_null(table: &TableIdentifier, column: &str) -> Result<Vec<Statement>> {
    Ok(vec![ddl::drop_not_null(table, column)?])
}

pub(super) async fn validate(
    ctx: &SchemaRuleContext<'_>,
    target: &ColumnTarget,
) -> Result<ValidationResult> {
    let Some(info) = ctx
        .introspector
        .column(&target.table, &target.column)
        .await?
    else {
        return Ok(ValidationResult::missing(describe(
            &target.table,
            &target.column,
        )));
    };
    let expected = target.db_type.catalog_name();
    if info.data_type != expected {
        return Ok(ValidationResult::extra(format!(
            "{} has type {}, expected {}",
            describe(&target.table, &target.column),
            info.data_type,
            expected
        )));
    }
    Ok(ValidationResult::ok())
}

pub(super) async fn validate_not_null(
    ctx: &SchemaRuleContext<'_>,
    table: &TableIdentifier,
    column: &str,
) -> Result<ValidationResult> {
    match ctx.introspector.column(table, column).await? {
        None => Ok(ValidationResult::missing(describe(table, column))),
        Some(info) if info.is_nullable => Ok(ValidationResult::missing(format!(
            "NOT NULL on {}",
            describe(table, column)
        ))),
        Some(_) => Ok(ValidationResult::ok()),
    }
}

pub(super) async fn validate_generated(
    ctx: &SchemaRuleContext<'_>,
    target: &ColumnTarget,
    source_column: &str,
) -> Result<ValidationResult> {
    let Some(info) = ctx
        .introspector
        .column(&target.table, &target.column)
        .await?
    else {
        return Ok(ValidationResult::missing(describe(
            &target.table,
            &target.column,
        )));
    };
    let name = describe(&target.table, &target.column);
    if !info.is_generated {
        return Ok(ValidationResult::extra(format!(
            "{} is a plain column, expected generated from {}",
            name, source_column
        )));
    }
    let mirrors_source = info
        .generation_expression
        .as_deref()
        .is_some_and(|expr| expr.contains(source_column));
    if !mirrors_source {
        return Ok(ValidationResult::extra(format!(
            "{} is not generated from {}",
            name, source_column
        )));
    }
    Ok(ValidationResult::ok())
}
