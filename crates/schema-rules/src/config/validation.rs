//! Configuration validation.

use super::{Config, DatabaseConfig, SchemaConfig};
use crate::core::identifier::validate_identifier;
use crate::drivers::SslMode;
use crate::error::{Result, SchemaError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(database) = &config.database {
        validate_database(database)?;
    }
    validate_schema(&config.schema)
}

fn validate_database(database: &DatabaseConfig) -> Result<()> {
    if database.host.is_empty() {
        return Err(SchemaError::Config("database.host is required".into()));
    }
    if database.database.is_empty() {
        return Err(SchemaError::Config("database.database is required".into()));
    }
    if database.user.is_empty() {
        return Err(SchemaError::Config("database.user is required".into()));
    }
    if database.max_connections == 0 {
        return Err(SchemaError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }
    SslMode::parse(&database.ssl_mode)?;
    Ok(())
}

fn validate_schema(schema: &SchemaConfig) -> Result<()> {
    let names = [
        ("schema.metadata_schema", schema.metadata_schema.as_deref()),
        ("schema.reference_table", Some(schema.reference_table.as_str())),
        ("schema.field_table", Some(schema.field_table.as_str())),
    ];
    for (key, name) in names {
        if let Some(name) = name {
            validate_identifier(name)
                .map_err(|e| SchemaError::Config(format!("{}: {}", key, e)))?;
        }
    }
    Ok(())
}
