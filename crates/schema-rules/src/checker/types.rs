//! Checker result types.

use serde::Serialize;

/// Lifecycle of one rule check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pending,
    Running,
    Success,
    Error,
    Warn,
}

impl CheckStatus {
    /// Whether no further result will follow for the same rule.
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckStatus::Success | CheckStatus::Error | CheckStatus::Warn)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Running => "running",
            CheckStatus::Success => "success",
            CheckStatus::Error => "error",
            CheckStatus::Warn => "warn",
        };
        write!(f, "{}", s)
    }
}

/// One progress record for a (field, rule) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCheckResult {
    /// Rule id, or a synthetic `{field_id}:{stage}` id for field-level failures.
    pub id: String,
    pub table_id: String,
    pub field_id: String,
    pub description: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub required: bool,
    /// Longest dependency chain above the rule; display only.
    pub depth: usize,
}

/// Counts of terminal results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub success: usize,
    pub error: usize,
    pub warn: usize,
}

impl CheckSummary {
    pub fn record(&mut self, result: &SchemaCheckResult) {
        match result.status {
            CheckStatus::Success => self.success += 1,
            CheckStatus::Error => self.error += 1,
            CheckStatus::Warn => self.warn += 1,
            CheckStatus::Pending | CheckStatus::Running => {}
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error > 0
    }

    pub fn total(&self) -> usize {
        self.success + self.error + self.warn
    }
}
