//! Identifier validation, quoting and physical name handling.
//!
//! SQL identifiers (schema, table, column, index and constraint names) cannot be
//! bound as statement parameters, so every builder goes through [`quote_ident`]
//! which validates the name and applies PostgreSQL double-quote escaping.
//!
//! [`TableIdentifier`] is the value type used wherever a physical table location
//! is named. It is produced from a table's `db_table_name` by
//! [`TableIdentifier::parse`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier before it is embedded in SQL.
///
/// Rejects empty names, names containing null bytes and names longer than
/// PostgreSQL keeps without truncation.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SchemaError::invariant("Identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(SchemaError::invariant(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::invariant(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a string literal (single quotes doubled).
///
/// Used where PostgreSQL cannot take a bind parameter, e.g. inside `DO` blocks.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Derive a physical column name from a field id.
///
/// The result is stable for a given id: characters outside `[A-Za-z0-9_]` become
/// `_`, and a leading digit gets an `f_` prefix.
pub fn db_field_name_for(field_id: &str) -> Result<String> {
    if field_id.is_empty() {
        return Err(SchemaError::invariant(
            "Cannot derive a db field name from an empty field id",
        ));
    }
    let mut name: String = field_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "f_");
    }
    validate_identifier(&name)?;
    Ok(name)
}

/// Physical location of a table: optional schema plus table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableIdentifier {
    /// Schema name; `None` means the connection's search path.
    pub schema: Option<String>,
    /// Table name.
    pub table_name: String,
}

impl TableIdentifier {
    /// Create an identifier with an explicit schema.
    pub fn new(schema: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table_name: table_name.into(),
        }
    }

    /// Create an identifier without a schema.
    pub fn unqualified(table_name: impl Into<String>) -> Self {
        Self {
            schema: None,
            table_name: table_name.into(),
        }
    }

    /// Split a `schema.table` (or bare `table`) db table name.
    pub fn parse(db_table_name: &str) -> Result<Self> {
        let parts: Vec<&str> = db_table_name.split('.').collect();
        match parts.as_slice() {
            [table] if !table.is_empty() => Ok(Self::unqualified(*table)),
            [schema, table] if !schema.is_empty() && !table.is_empty() => {
                Ok(Self::new(*schema, *table))
            }
            _ => Err(SchemaError::invariant(format!(
                "Malformed db table name {:?}: expected \"schema.table\" or \"table\"",
                db_table_name
            ))),
        }
    }

    /// Quoted, schema-qualified name for use in DDL.
    pub fn qualified(&self) -> Result<String> {
        match &self.schema {
            Some(schema) => Ok(format!(
                "{}.{}",
                quote_ident(schema)?,
                quote_ident(&self.table_name)?
            )),
            None => quote_ident(&self.table_name),
        }
    }

    /// Quoted name of a schema-scoped object (index) living in this table's schema.
    pub fn qualify_object(&self, name: &str) -> Result<String> {
        match &self.schema {
            Some(schema) => Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(name)?)),
            None => quote_ident(name),
        }
    }

    /// Schema used for catalog lookups (`public` when unqualified).
    pub fn schema_or_public(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }

    /// Whether both identifiers name the same physical table, treating an
    /// unqualified name as `public`.
    pub fn same_location(&self, other: &TableIdentifier) -> bool {
        self.table_name == other.table_name && self.schema_or_public() == other.schema_or_public()
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table_name),
            None => write!(f, "{}", self.table_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("__fk_fldabc").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&long_name);
        assert!(result.unwrap_err().to_string().contains("maximum length"));
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    // =========================================================================
    // Quoting tests
    // =========================================================================

    #[test]
    fn test_quote_ident_escapes_double_quote() {
        assert_eq!(quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(quote_ident("a\"b").unwrap(), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_literal_escapes_single_quote() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    // =========================================================================
    // TableIdentifier tests
    // =========================================================================

    #[test]
    fn test_parse_schema_and_table() {
        let id = TableIdentifier::parse("bseabc.tblxyz").unwrap();
        assert_eq!(id.schema.as_deref(), Some("bseabc"));
        assert_eq!(id.table_name, "tblxyz");
        assert_eq!(id.qualified().unwrap(), "\"bseabc\".\"tblxyz\"");
        assert_eq!(id.to_string(), "bseabc.tblxyz");
    }

    #[test]
    fn test_parse_bare_table() {
        let id = TableIdentifier::parse("tblxyz").unwrap();
        assert!(id.schema.is_none());
        assert_eq!(id.qualified().unwrap(), "\"tblxyz\"");
        assert_eq!(id.schema_or_public(), "public");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TableIdentifier::parse("").is_err());
        assert!(TableIdentifier::parse("a.b.c").is_err());
        assert!(TableIdentifier::parse(".tbl").is_err());
        assert!(TableIdentifier::parse("bse.").is_err());
    }

    #[test]
    fn test_qualify_object_uses_table_schema() {
        let id = TableIdentifier::new("bse", "tbl");
        assert_eq!(
            id.qualify_object("index_x").unwrap(),
            "\"bse\".\"index_x\""
        );
    }

    #[test]
    fn test_same_location_defaults_schema() {
        let bare = TableIdentifier::unqualified("tbl");
        assert!(bare.same_location(&TableIdentifier::new("public", "tbl")));
        assert!(!bare.same_location(&TableIdentifier::new("bse", "tbl")));
    }

    #[test]
    fn test_db_field_name_is_deterministic() {
        assert_eq!(db_field_name_for("fldAbc123").unwrap(), "fldAbc123");
        assert_eq!(db_field_name_for("fld-1.x").unwrap(), "fld_1_x");
        assert_eq!(db_field_name_for("9lives").unwrap(), "f_9lives");
        assert!(db_field_name_for("").is_err());
    }
}
