//! Executable statement values.
//!
//! Builders and rules never hand out bare strings: they return [`Statement`]s
//! carrying SQL text with `$n` placeholders plus the bound values, and an
//! [`Executor`](super::traits::Executor) decides how to run them.

use std::fmt;

use serde::Serialize;
use tokio_postgres::types::ToSql;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    Bool(bool),
    Float(f64),
    Int(i64),
    Json(serde_json::Value),
    TextArray(Vec<String>),
}

impl SqlParam {
    /// Borrow the value as a tokio-postgres parameter.
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Text(v) => v,
            SqlParam::Bool(v) => v,
            SqlParam::Float(v) => v,
            SqlParam::Int(v) => v,
            SqlParam::Json(v) => v,
            SqlParam::TextArray(v) => v,
        }
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<Vec<String>> for SqlParam {
    fn from(v: Vec<String>) -> Self {
        SqlParam::TextArray(v)
    }
}

/// A single SQL statement with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<SqlParam>,
}

impl Statement {
    /// Statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Statement with bound parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Parameters in the shape tokio-postgres expects.
    pub fn pg_params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(SqlParam::as_sql).collect()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            let rendered: Vec<String> = self
                .params
                .iter()
                .map(|p| match p {
                    SqlParam::Text(v) => format!("{:?}", v),
                    SqlParam::Bool(v) => v.to_string(),
                    SqlParam::Float(v) => v.to_string(),
                    SqlParam::Int(v) => v.to_string(),
                    SqlParam::Json(v) => v.to_string(),
                    SqlParam::TextArray(v) => format!("{:?}", v),
                })
                .collect();
            write!(f, " -- params: [{}]", rendered.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_params() {
        let stmt = Statement::new("DROP TABLE IF EXISTS \"t\"");
        assert_eq!(stmt.to_string(), "DROP TABLE IF EXISTS \"t\"");
    }

    #[test]
    fn test_display_with_params() {
        let stmt = Statement::with_params(
            "DELETE FROM \"reference\" WHERE from_field_id = $1",
            vec!["fld1".into()],
        );
        assert!(stmt.to_string().ends_with("-- params: [\"fld1\"]"));
        assert_eq!(stmt.pg_params().len(), 1);
    }
}
