//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::policy::{MetadataTables, PersistencePolicy};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection; only `plan` runs without one.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Physical layout decisions.
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Where metadata lives and how system fields are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Store system fields as generated columns (default: false).
    #[serde(default)]
    pub generated_system_columns: bool,

    /// Schema of the reference and field tables; unset means the search path.
    #[serde(default)]
    pub metadata_schema: Option<String>,

    /// Reference ledger table (default: "reference").
    #[serde(default = "default_reference_table")]
    pub reference_table: String,

    /// Field record table (default: "field").
    #[serde(default = "default_field_table")]
    pub field_table: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            generated_system_columns: false,
            metadata_schema: None,
            reference_table: default_reference_table(),
            field_table: default_field_table(),
        }
    }
}

impl SchemaConfig {
    pub fn policy(&self) -> PersistencePolicy {
        PersistencePolicy {
            generated_system_columns: self.generated_system_columns,
        }
    }

    pub fn metadata_tables(&self) -> MetadataTables {
        MetadataTables {
            schema: self.metadata_schema.clone(),
            reference_table: self.reference_table.clone(),
            field_table: self.field_table.clone(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_require() -> String {
    "require".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_reference_table() -> String {
    "reference".to_string()
}

fn default_field_table() -> String {
    "field".to_string()
}
