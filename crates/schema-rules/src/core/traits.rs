//! Execution seam between the engine and the database driver.
//!
//! - [`Executor`]: runs [`Statement`]s (a pool, a transaction, or a recorder)
//! - [`ExecutionContext`]: the ambient choice between a caller transaction and
//!   the shared pool
//!
//! Nothing in the rule layer executes SQL; only the repository and the
//! PostgreSQL introspector talk to an executor.

use async_trait::async_trait;
use tokio_postgres::Row;

use super::statement::Statement;
use crate::error::Result;

/// Runs statements against a database.
///
/// Implementations must be `Send + Sync` so a single executor can be shared
/// by the repository and the introspector within one call.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a statement, returning the affected row count.
    async fn execute(&self, stmt: &Statement) -> Result<u64>;

    /// Run a query and return its rows.
    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>>;

    /// Execute statements sequentially, stopping at the first failure.
    ///
    /// Statements already executed are not compensated; atomicity belongs to
    /// the surrounding transaction.
    async fn execute_all(&self, stmts: &[Statement]) -> Result<()> {
        for stmt in stmts {
            self.execute(stmt).await?;
        }
        Ok(())
    }

    /// Executor kind for logging/debugging.
    fn kind(&self) -> &'static str;
}

/// Ambient execution context for one logical operation.
///
/// A caller-supplied transaction always wins over the shared pool so that
/// schema changes join the caller's unit of work.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pool: &'a dyn Executor,
    transaction: Option<&'a dyn Executor>,
}

impl<'a> ExecutionContext<'a> {
    /// Context that runs everything on the shared pool.
    pub fn new(pool: &'a dyn Executor) -> Self {
        Self {
            pool,
            transaction: None,
        }
    }

    /// Context bound to a caller transaction.
    pub fn with_transaction(mut self, transaction: &'a dyn Executor) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// The executor operations should use.
    pub fn executor(&self) -> &'a dyn Executor {
        self.transaction.unwrap_or(self.pool)
    }

    /// Whether a caller transaction is active.
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }
}
