//! Recomputation of stored values after fields are added.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::warn;

use crate::core::schema::{Field, Table};
use crate::core::traits::ExecutionContext;
use crate::error::Result;

/// Fills the columns of newly added fields.
///
/// Called by [`SchemaRepository::update`](super::SchemaRepository::update) after
/// the schema change has executed, at most once per call and only with a
/// non-empty field list. Runs on the same execution context, so it joins the
/// caller's transaction when there is one.
#[async_trait]
pub trait ComputedFieldBackfill: Send + Sync {
    async fn backfill_many(
        &self,
        ctx: &ExecutionContext<'_>,
        table: &Table,
        fields: &[Field],
    ) -> Result<()>;

    /// Backfill kind for logging.
    fn kind(&self) -> &'static str;
}

/// Backfill that does nothing. Logs a warning on first use.
pub struct NoOpBackfill {
    warned: AtomicBool,
}

impl NoOpBackfill {
    pub fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
        }
    }
}

impl Default for NoOpBackfill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputedFieldBackfill for NoOpBackfill {
    async fn backfill_many(
        &self,
        _ctx: &ExecutionContext<'_>,
        table: &Table,
        fields: &[Field],
    ) -> Result<()> {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                "No backfill configured: {} added field(s) on {} keep empty values",
                fields.len(),
                table.id
            );
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "noop"
    }
}
