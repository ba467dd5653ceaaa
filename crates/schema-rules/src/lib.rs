//! # schema-rules
//!
//! Declarative schema rules for the physical PostgreSQL layout behind logical
//! tables and fields.
//!
//! Every logical field maps to a set of [`SchemaRule`]s (columns, indexes,
//! constraints, junction tables, metadata rows). The same rules are used to:
//!
//! - **Apply** schema: [`SchemaRepository`] creates, alters and drops tables
//!   by resolving rules in dependency order and executing their statements
//! - **Plan** schema: every repository operation has a pure `plan_*` twin
//! - **Check** schema: [`SchemaChecker`] streams per-rule results comparing the
//!   expected layout with the live catalog
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use schema_rules::{
//!     Config, ExecutionContext, NoOpBackfill, PgPool, PgTransaction, SchemaRepository, Table,
//! };
//!
//! #[tokio::main]
//! async fn main() -> schema_rules::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let pool = PgPool::connect(config.require_database("apply")?).await?;
//!     let tables: Vec<Table> = serde_yaml::from_str(&std::fs::read_to_string("tables.yaml")?)?;
//!
//!     let repo = SchemaRepository::new(
//!         config.schema.policy(),
//!         config.schema.metadata_tables(),
//!         Arc::new(NoOpBackfill::new()),
//!     );
//!     let mut client = pool.client().await?;
//!     let tx = PgTransaction::begin(&mut client).await?;
//!     repo.insert_many(&ExecutionContext::new(&pool).with_transaction(&tx), &tables)
//!         .await?;
//!     tx.commit().await
//! }
//! ```

pub mod checker;
pub mod config;
pub mod core;
pub mod ddl;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod introspect;
pub mod repository;
pub mod resolver;
pub mod rules;

// Re-exports for convenient access
pub use checker::{CheckStatus, CheckSummary, SchemaCheckResult, SchemaChecker};
pub use config::{Config, DatabaseConfig, SchemaConfig};
pub use crate::core::{
    ExecutionContext, Executor, Field, FieldKind, MetadataTables, PersistencePolicy, Statement,
    Table, TableIdentifier,
};
pub use drivers::{PgPool, PgTransaction, RecordingExecutor};
pub use error::{Result, SchemaError};
pub use factory::RuleFactory;
pub use introspect::{PgIntrospector, SchemaIntrospector};
pub use repository::{
    assign_db_field_names, ComputedFieldBackfill, NoOpBackfill, SchemaRepository, TableMutation,
};
pub use rules::{SchemaRule, SchemaRuleContext, ValidationResult};
