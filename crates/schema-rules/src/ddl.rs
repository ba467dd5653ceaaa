//! PostgreSQL statement builders.
//!
//! Pure functions: every builder validates and quotes its identifiers and returns
//! a [`Statement`], never touching a connection. All DDL is idempotent so a
//! batch can be re-run after a crash without external locking:
//!
//! - `CREATE ... IF NOT EXISTS` / `DROP ... IF EXISTS` where PostgreSQL supports it
//! - `DO` blocks guarded by catalog checks where it does not (constraints)

use crate::core::identifier::{quote_ident, quote_literal, TableIdentifier};
use crate::core::statement::Statement;
use crate::error::{Result, SchemaError};

/// Dollar-quote tag for the outer `DO` body.
const DO_TAG: &str = "$do$";
/// Dollar-quote tag for the DDL executed inside a guard.
const DDL_TAG: &str = "$ddl$";

/// Action taken on referencing rows when the referenced row goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
}

impl ReferentialAction {
    fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
        }
    }
}

/// Column definition used by `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Type plus any inline constraints, e.g. `text NOT NULL UNIQUE`.
    pub definition: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// `CREATE SCHEMA IF NOT EXISTS`.
pub fn create_schema(schema: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        quote_ident(schema)?
    )))
}

/// `CREATE TABLE IF NOT EXISTS` with the given columns.
pub fn create_table(table: &TableIdentifier, columns: &[ColumnDef]) -> Result<Statement> {
    if columns.is_empty() {
        return Err(SchemaError::invariant(format!(
            "Cannot create table {} without columns",
            table
        )));
    }
    let col_defs = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.definition)))
        .collect::<Result<Vec<String>>>()?;

    Ok(Statement::new(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table.qualified()?,
        col_defs.join(",\n    ")
    )))
}

/// `DROP TABLE IF EXISTS`.
pub fn drop_table(table: &TableIdentifier) -> Result<Statement> {
    Ok(Statement::new(format!(
        "DROP TABLE IF EXISTS {}",
        table.qualified()?
    )))
}

/// `ALTER TABLE ... ADD COLUMN IF NOT EXISTS`.
pub fn add_column(table: &TableIdentifier, column: &str, sql_type: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
        table.qualified()?,
        quote_ident(column)?,
        sql_type
    )))
}

/// Add a stored generated column mirroring `source_column`.
pub fn add_generated_column(
    table: &TableIdentifier,
    column: &str,
    sql_type: &str,
    source_column: &str,
) -> Result<Statement> {
    let source = quote_ident(source_column)?;
    // Base columns may differ in storage type (serial vs double precision).
    Ok(Statement::new(format!(
        "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {} GENERATED ALWAYS AS ({}::{}) STORED",
        table.qualified()?,
        quote_ident(column)?,
        sql_type,
        source,
        sql_type
    )))
}

/// `ALTER TABLE IF EXISTS ... DROP COLUMN IF EXISTS`.
pub fn drop_column(table: &TableIdentifier, column: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE IF EXISTS {} DROP COLUMN IF EXISTS {}",
        table.qualified()?,
        quote_ident(column)?
    )))
}

/// `ALTER TABLE ... RENAME COLUMN`.
pub fn rename_column(table: &TableIdentifier, from: &str, to: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        table.qualified()?,
        quote_ident(from)?,
        quote_ident(to)?
    )))
}

/// Copy every value of one column into another.
pub fn copy_column(table: &TableIdentifier, from: &str, to: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "UPDATE {} SET {} = {}",
        table.qualified()?,
        quote_ident(to)?,
        quote_ident(from)?
    )))
}

/// `ALTER COLUMN ... SET NOT NULL` (a no-op when already set).
pub fn set_not_null(table: &TableIdentifier, column: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
        table.qualified()?,
        quote_ident(column)?
    )))
}

/// `ALTER COLUMN ... DROP NOT NULL`, guarded so it is safe once the column is gone.
pub fn drop_not_null(table: &TableIdentifier, column: &str) -> Result<Statement> {
    let inner = format!(
        "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
        table.qualified()?,
        quote_ident(column)?
    );
    guarded(&[column_exists_condition(table, column)?], &inner)
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS`.
pub fn create_index(
    table: &TableIdentifier,
    name: &str,
    columns: &[&str],
    unique: bool,
) -> Result<Statement> {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<String>>>()?;
    let unique = if unique { "UNIQUE " } else { "" };
    Ok(Statement::new(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        unique,
        quote_ident(name)?,
        table.qualified()?,
        cols.join(", ")
    )))
}

/// `DROP INDEX IF EXISTS`, qualified with the table's schema.
pub fn drop_index(table: &TableIdentifier, name: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "DROP INDEX IF EXISTS {}",
        table.qualify_object(name)?
    )))
}

/// Add a named `UNIQUE` constraint unless one with that name already exists.
pub fn add_unique_constraint(
    table: &TableIdentifier,
    name: &str,
    columns: &[&str],
) -> Result<Statement> {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<String>>>()?;
    let inner = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        table.qualified()?,
        quote_ident(name)?,
        cols.join(", ")
    );
    guarded(
        &[
            table_exists_condition(table)?,
            constraint_missing_condition(table, name)?,
        ],
        &inner,
    )
}

/// `ALTER TABLE IF EXISTS ... DROP CONSTRAINT IF EXISTS`.
pub fn drop_constraint(table: &TableIdentifier, name: &str) -> Result<Statement> {
    Ok(Statement::new(format!(
        "ALTER TABLE IF EXISTS {} DROP CONSTRAINT IF EXISTS {}",
        table.qualified()?,
        quote_ident(name)?
    )))
}

/// Foreign key creation that is skipped when either table is missing or the
/// constraint already exists.
///
/// A skipped constraint is picked up by a later pass once the referenced table
/// has been created.
pub fn add_foreign_key_guarded(
    table: &TableIdentifier,
    name: &str,
    column: &str,
    referenced: &TableIdentifier,
    referenced_column: &str,
    on_delete: ReferentialAction,
) -> Result<Statement> {
    let inner = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
        table.qualified()?,
        quote_ident(name)?,
        quote_ident(column)?,
        referenced.qualified()?,
        quote_ident(referenced_column)?,
        on_delete.as_sql()
    );
    guarded(
        &[
            table_exists_condition(table)?,
            table_exists_condition(referenced)?,
            column_exists_condition(table, column)?,
            constraint_missing_condition(table, name)?,
        ],
        &inner,
    )
}

/// Wrap a single statement in a `DO` block that only runs it when every
/// condition holds.
pub fn guarded(conditions: &[String], sql: &str) -> Result<Statement> {
    if sql.contains(DDL_TAG) || sql.contains(DO_TAG) {
        return Err(SchemaError::invariant(format!(
            "Statement cannot be guarded because it contains a reserved dollar-quote tag: {}",
            sql
        )));
    }
    let condition = if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join("\n     AND ")
    };
    Ok(Statement::new(format!(
        "DO {do_tag}\nBEGIN\n  IF {condition} THEN\n    EXECUTE {ddl_tag}{sql}{ddl_tag};\n  END IF;\nEND\n{do_tag}",
        do_tag = DO_TAG,
        ddl_tag = DDL_TAG,
        condition = condition,
        sql = sql
    )))
}

/// Condition: the table exists.
pub fn table_exists_condition(table: &TableIdentifier) -> Result<String> {
    Ok(format!(
        "to_regclass({}) IS NOT NULL",
        quote_literal(&table.qualified()?)
    ))
}

/// Condition: the table has the column.
pub fn column_exists_condition(table: &TableIdentifier, column: &str) -> Result<String> {
    crate::core::identifier::validate_identifier(column)?;
    Ok(format!(
        "EXISTS (SELECT 1 FROM pg_catalog.pg_attribute WHERE attrelid = to_regclass({}) AND attname = {} AND NOT attisdropped)",
        quote_literal(&table.qualified()?),
        quote_literal(column)
    ))
}

/// Condition: no constraint with this name exists on the table.
pub fn constraint_missing_condition(table: &TableIdentifier, name: &str) -> Result<String> {
    crate::core::identifier::validate_identifier(name)?;
    Ok(format!(
        "NOT EXISTS (SELECT 1 FROM pg_catalog.pg_constraint WHERE conname = {} AND conrelid = to_regclass({}))",
        quote_literal(name),
        quote_literal(&table.qualified()?)
    ))
}

/// Index name for a plain or FK index.
pub fn index_name(column: &str) -> String {
    format!("index_{}", column)
}

/// Index name for a unique index on a field column.
pub fn unique_index_name(table_name: &str, column: &str) -> String {
    format!("{}_{}_unique", table_name, column)
}

/// Constraint name for a foreign key.
pub fn foreign_key_name(column: &str) -> String {
    format!("fk_{}", column)
}

/// Constraint name for a junction table's composite unique key.
pub fn junction_unique_name(self_key: &str, foreign_key: &str) -> String {
    format!("uniq_{}_{}", self_key, foreign_key)
}
