//! Core types shared by every layer of the engine.
//!
//! - [`identifier`]: identifier quoting and [`TableIdentifier`]
//! - [`policy`]: persistence policy and metadata table locations
//! - [`schema`]: the logical [`Table`] / [`Field`] model
//! - [`statement`]: executable [`Statement`] values
//! - [`traits`]: the [`Executor`] seam and [`ExecutionContext`]

pub mod identifier;
pub mod policy;
pub mod schema;
pub mod statement;
pub mod traits;

pub use identifier::{quote_ident, quote_literal, TableIdentifier};
pub use policy::{MetadataTables, PersistencePolicy};
pub use schema::{
    CellValueType, ConditionalOptions, DbFieldType, Field, FieldKind, FormulaOptions, LinkOptions,
    LookupOptions, Relationship, RollupOptions, Table,
};
pub use statement::{SqlParam, Statement};
pub use traits::{ExecutionContext, Executor};
