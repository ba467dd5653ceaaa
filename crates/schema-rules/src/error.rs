//! Error types for the schema rule engine.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for violated preconditions.
pub const EXIT_INVARIANT_ERROR: u8 = 2;
/// Exit code for rule dependency cycles.
pub const EXIT_CYCLE_ERROR: u8 = 3;
/// Exit code for database failures.
pub const EXIT_INFRASTRUCTURE_ERROR: u8 = 4;
/// Exit code when a schema check reported errors.
pub const EXIT_CHECK_FAILED: u8 = 5;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for schema operations.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A precondition was violated (missing db field name, malformed table name, ...).
    ///
    /// Never retried; nothing has been executed when this is returned.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Rule dependencies form a cycle.
    #[error("Circular dependency detected between rules: {}", .ids.join(", "))]
    DependencyCycle { ids: Vec<String> },

    /// Introspection or DDL execution failed.
    #[error("Infrastructure error: {message}\n  Context: {context}")]
    Infrastructure { message: String, context: String },

    /// Database driver error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A schema check finished with error results.
    #[error("Schema check failed: {0} rule(s) reported errors")]
    CheckFailed(usize),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Create an Invariant error.
    pub fn invariant(message: impl Into<String>) -> Self {
        SchemaError::Invariant(message.into())
    }

    /// Create an Infrastructure error, keeping the original message.
    pub fn infrastructure(message: impl ToString, context: impl Into<String>) -> Self {
        SchemaError::Infrastructure {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SchemaError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Stable tag for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaError::Config(_) | SchemaError::Yaml(_) | SchemaError::Json(_) => "config",
            SchemaError::Invariant(_) => "invariant",
            SchemaError::DependencyCycle { .. } => "cycle",
            SchemaError::Infrastructure { .. } | SchemaError::Database(_) | SchemaError::Pool { .. } => {
                "infrastructure"
            }
            SchemaError::CheckFailed(_) => "check",
            SchemaError::Io(_) => "io",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            "invariant" => EXIT_INVARIANT_ERROR,
            "cycle" => EXIT_CYCLE_ERROR,
            "infrastructure" => EXIT_INFRASTRUCTURE_ERROR,
            "check" => EXIT_CHECK_FAILED,
            "io" => EXIT_IO_ERROR,
            _ => EXIT_CONFIG_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
