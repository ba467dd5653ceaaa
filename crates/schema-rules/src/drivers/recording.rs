//! Executor that records statements instead of running them.
//!
//! Backs `plan` (print what would be executed) and the repository tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio_postgres::Row;

use crate::core::statement::Statement;
use crate::core::traits::Executor;
use crate::error::{Result, SchemaError};

#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<Statement>>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement whose SQL contains `pattern`, after recording it.
    pub fn failing_on(pattern: impl Into<String>) -> Self {
        Self {
            statements: Mutex::default(),
            fail_on: Some(pattern.into()),
        }
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        match self.statements.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        match self.statements.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    fn record(&self, stmt: &Statement) -> Result<()> {
        match self.statements.lock() {
            Ok(mut guard) => guard.push(stmt.clone()),
            Err(poisoned) => poisoned.into_inner().push(stmt.clone()),
        }
        match &self.fail_on {
            Some(pattern) if stmt.sql.contains(pattern.as_str()) => Err(
                SchemaError::infrastructure(format!("injected failure on {:?}", pattern), stmt.sql.clone()),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, stmt: &Statement) -> Result<u64> {
        self.record(stmt)?;
        Ok(0)
    }

    async fn query(&self, _stmt: &Statement) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }

    fn kind(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let exec = RecordingExecutor::new();
        exec.execute(&Statement::new("SELECT 1")).await.unwrap();
        exec.execute(&Statement::new("SELECT 2")).await.unwrap();
        let sql: Vec<String> = exec.statements().into_iter().map(|s| s.sql).collect();
        assert_eq!(sql, vec!["SELECT 1", "SELECT 2"]);

        exec.clear();
        assert!(exec.statements().is_empty());
    }

    #[tokio::test]
    async fn test_execute_all_stops_at_failure() {
        let exec = RecordingExecutor::failing_on("boom");
        let result = exec
            .execute_all(&[
                Statement::new("SELECT 1"),
                Statement::new("SELECT boom"),
                Statement::new("SELECT 3"),
            ])
            .await;
        assert_eq!(result.unwrap_err().kind(), "infrastructure");
        assert_eq!(exec.statements().len(), 2);
    }

    #[tokio::test]
    async fn test_queries_are_not_recorded() {
        let exec = RecordingExecutor::new();
        assert!(exec.query(&Statement::new("SELECT 1")).await.unwrap().is_empty());
        assert!(exec.statements().is_empty());
    }
}
