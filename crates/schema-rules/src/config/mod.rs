//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use tokio_postgres::config::Host;

use crate::error::{Result, SchemaError};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The database section, or a config error naming the command that needs it.
    pub fn require_database(&self, command: &str) -> Result<&DatabaseConfig> {
        self.database.as_ref().ok_or_else(|| {
            SchemaError::Config(format!("'{}' requires a database section", command))
        })
    }
}

impl DatabaseConfig {
    /// Build settings from a `postgres://` URL or a key/value connection string.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed: tokio_postgres::Config = url
            .parse()
            .map_err(|e| SchemaError::Config(format!("Invalid database URL: {}", e)))?;

        let host = match parsed.get_hosts().first() {
            Some(Host::Tcp(host)) => host.clone(),
            #[cfg(unix)]
            Some(Host::Unix(path)) => path.display().to_string(),
            None => "localhost".to_string(),
        };
        let ssl_mode = match parsed.get_ssl_mode() {
            tokio_postgres::config::SslMode::Require => "require",
            _ => "disable",
        };

        let config = Self {
            host,
            port: parsed.get_ports().first().copied().unwrap_or(5432),
            database: parsed.get_dbname().unwrap_or("postgres").to_string(),
            user: parsed.get_user().unwrap_or("postgres").to_string(),
            password: parsed
                .get_password()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default(),
            ssl_mode: ssl_mode.to_string(),
            max_connections: 4,
        };
        validation::validate(&Config {
            database: Some(config.clone()),
            schema: SchemaConfig::default(),
        })?;
        Ok(config)
    }

    /// Connection string for logging, without the password.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}
