//! In-memory catalog used by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ColumnInfo, ConstraintInfo, ConstraintKind, FieldRecord, IndexInfo, ReferenceEdge,
    SchemaIntrospector,
};
use crate::core::identifier::TableIdentifier;
use crate::error::{Result, SchemaError};

#[derive(Debug, Default, Clone)]
struct MemoryTable {
    columns: HashMap<String, ColumnInfo>,
    indexes: HashMap<String, IndexInfo>,
    constraints: HashMap<String, ConstraintInfo>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    references: Vec<ReferenceEdge>,
    fields: HashMap<String, FieldRecord>,
    failing_columns: Vec<String>,
}

/// Catalog held in memory; every lookup counts as one query.
#[derive(Debug, Default)]
pub struct MemoryIntrospector {
    state: Mutex<State>,
    queries: AtomicUsize,
}

fn key(table: &TableIdentifier) -> String {
    format!("{}.{}", table.schema_or_public(), table.table_name)
}

impl MemoryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lookups served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn add_table(&self, table: &TableIdentifier) {
        self.with_state(|s| {
            s.tables.entry(key(table)).or_default();
        });
    }

    pub fn drop_table(&self, table: &TableIdentifier) {
        self.with_state(|s| {
            s.tables.remove(&key(table));
        });
    }

    pub fn add_column(&self, table: &TableIdentifier, column: &str, info: ColumnInfo) {
        self.with_state(|s| {
            s.tables
                .entry(key(table))
                .or_default()
                .columns
                .insert(column.to_string(), info);
        });
    }

    pub fn drop_column(&self, table: &TableIdentifier, column: &str) {
        self.with_state(|s| {
            if let Some(t) = s.tables.get_mut(&key(table)) {
                t.columns.remove(column);
            }
        });
    }

    pub fn add_index(&self, table: &TableIdentifier, name: &str, columns: &[&str], unique: bool) {
        self.with_state(|s| {
            s.tables.entry(key(table)).or_default().indexes.insert(
                name.to_string(),
                IndexInfo {
                    columns: columns.iter().map(|c| c.to_string()).collect(),
                    is_unique: unique,
                },
            );
        });
    }

    pub fn add_constraint(&self, table: &TableIdentifier, name: &str, info: ConstraintInfo) {
        self.with_state(|s| {
            s.tables
                .entry(key(table))
                .or_default()
                .constraints
                .insert(name.to_string(), info);
        });
    }

    /// Shorthand for a single-column foreign key to `referenced.__id`.
    pub fn add_foreign_key(
        &self,
        table: &TableIdentifier,
        name: &str,
        column: &str,
        referenced: &TableIdentifier,
    ) {
        self.add_constraint(
            table,
            name,
            ConstraintInfo {
                kind: ConstraintKind::ForeignKey,
                columns: vec![column.to_string()],
                referenced_table: Some(TableIdentifier::new(
                    referenced.schema_or_public(),
                    referenced.table_name.clone(),
                )),
                referenced_columns: vec!["__id".to_string()],
            },
        );
    }

    pub fn add_reference(&self, edge: ReferenceEdge) {
        self.with_state(|s| {
            if !s.references.contains(&edge) {
                s.references.push(edge);
            }
        });
    }

    pub fn put_field(&self, record: FieldRecord) {
        self.with_state(|s| {
            s.fields.insert(record.id.clone(), record);
        });
    }

    /// Make lookups of this column fail with an infrastructure error.
    pub fn fail_column(&self, column: &str) {
        self.with_state(|s| s.failing_columns.push(column.to_string()));
    }

    fn count(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SchemaIntrospector for MemoryIntrospector {
    async fn table_exists(&self, table: &TableIdentifier) -> Result<bool> {
        self.count();
        Ok(self.with_state(|s| s.tables.contains_key(&key(table))))
    }

    async fn column(&self, table: &TableIdentifier, column: &str) -> Result<Option<ColumnInfo>> {
        self.count();
        self.with_state(|s| {
            if s.failing_columns.iter().any(|c| c == column) {
                return Err(SchemaError::infrastructure(
                    "connection reset by peer",
                    format!("introspecting column {}.{}", table, column),
                ));
            }
            Ok(s.tables
                .get(&key(table))
                .and_then(|t| t.columns.get(column))
                .cloned())
        })
    }

    async fn index(&self, table: &TableIdentifier, name: &str) -> Result<Option<IndexInfo>> {
        self.count();
        Ok(self.with_state(|s| {
            s.tables
                .get(&key(table))
                .and_then(|t| t.indexes.get(name))
                .cloned()
        }))
    }

    async fn constraint(
        &self,
        table: &TableIdentifier,
        name: &str,
    ) -> Result<Option<ConstraintInfo>> {
        self.count();
        Ok(self.with_state(|s| {
            s.tables
                .get(&key(table))
                .and_then(|t| t.constraints.get(name))
                .cloned()
        }))
    }

    async fn reference_edges(&self, field_id: &str) -> Result<Vec<ReferenceEdge>> {
        self.count();
        Ok(self.with_state(|s| {
            s.references
                .iter()
                .filter(|e| e.from_field_id == field_id || e.to_field_id == field_id)
                .cloned()
                .collect()
        }))
    }

    async fn field_record(&self, field_id: &str) -> Result<Option<FieldRecord>> {
        self.count();
        Ok(self.with_state(|s| s.fields.get(field_id).cloned()))
    }
}
