//! Read-only view of the live catalog.
//!
//! The [`SchemaIntrospector`] trait is what rules validate against. It answers
//! existence and shape questions about tables, columns, indexes and constraints,
//! and reads the product's own metadata tables (reference ledger, field records).
//!
//! - [`PgIntrospector`]: catalog queries over any [`Executor`](crate::core::Executor)
//! - `MemoryIntrospector`: an in-memory catalog for tests (`testing` feature)

mod postgres;

#[cfg(any(test, feature = "testing"))]
mod memory;

pub use postgres::PgIntrospector;

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryIntrospector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::identifier::TableIdentifier;
use crate::error::Result;

/// Shape of a live column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Type as reported by `format_type` (e.g. `double precision`).
    pub data_type: String,
    pub is_nullable: bool,
    pub is_generated: bool,
    pub generation_expression: Option<String>,
}

impl ColumnInfo {
    /// Plain nullable column of the given type.
    pub fn nullable(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            is_nullable: true,
            is_generated: false,
            generation_expression: None,
        }
    }
}

/// Shape of a live index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub columns: Vec<String>,
    pub is_unique: bool,
}

/// Constraint type as stored in `pg_constraint.contype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Other,
}

impl ConstraintKind {
    /// Map a `contype` code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "p" => ConstraintKind::PrimaryKey,
            "u" => ConstraintKind::Unique,
            "f" => ConstraintKind::ForeignKey,
            "c" => ConstraintKind::Check,
            _ => ConstraintKind::Other,
        }
    }
}

/// Shape of a live constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    /// Referenced table for foreign keys.
    pub referenced_table: Option<TableIdentifier>,
    pub referenced_columns: Vec<String>,
}

/// One dependency edge in the reference ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub from_field_id: String,
    pub to_field_id: String,
}

impl ReferenceEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_field_id: from.into(),
            to_field_id: to.into(),
        }
    }
}

/// A row of the field metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: String,
    pub table_id: String,
    /// Field type tag (`link`, `formula`, ...).
    pub kind: String,
    pub is_lookup: bool,
    /// Type-specific options, as stored.
    pub options: serde_json::Value,
    pub meta: Option<serde_json::Value>,
    pub deleted: bool,
}

/// Read-only catalog facade used by rule validation.
///
/// Every method is a single round trip; implementations keep no cache so that
/// each check observes the live state.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Check if a table exists.
    async fn table_exists(&self, table: &TableIdentifier) -> Result<bool>;

    /// Load a column's shape, `None` when absent.
    async fn column(&self, table: &TableIdentifier, column: &str) -> Result<Option<ColumnInfo>>;

    /// Check if a column exists.
    async fn column_exists(&self, table: &TableIdentifier, column: &str) -> Result<bool> {
        Ok(self.column(table, column).await?.is_some())
    }

    /// Load an index by name, `None` when absent.
    async fn index(&self, table: &TableIdentifier, name: &str) -> Result<Option<IndexInfo>>;

    /// Load a constraint by name, `None` when absent.
    async fn constraint(
        &self,
        table: &TableIdentifier,
        name: &str,
    ) -> Result<Option<ConstraintInfo>>;

    /// Load a foreign key constraint by name.
    ///
    /// Constraints of other kinds with the same name are reported as absent.
    async fn foreign_key(
        &self,
        table: &TableIdentifier,
        name: &str,
    ) -> Result<Option<ConstraintInfo>> {
        Ok(self
            .constraint(table, name)
            .await?
            .filter(|c| c.kind == ConstraintKind::ForeignKey))
    }

    /// Reference edges touching a field in either direction.
    async fn reference_edges(&self, field_id: &str) -> Result<Vec<ReferenceEdge>>;

    /// Load a field record by id.
    async fn field_record(&self, field_id: &str) -> Result<Option<FieldRecord>>;
}
