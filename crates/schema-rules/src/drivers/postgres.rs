//! PostgreSQL connection pool and transaction executors.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, Row};
use tracing::{debug, info, warn};

use super::tls::{self, SslMode};
use crate::config::DatabaseConfig;
use crate::core::statement::Statement;
use crate::core::traits::Executor;
use crate::error::{Result, SchemaError};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest statement prefix quoted in error context.
const CONTEXT_SQL_CHARS: usize = 120;

/// Render a driver error with the server's SQLSTATE and message when present.
pub(crate) fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}

fn statement_context(stmt: &Statement) -> String {
    let sql = stmt.sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = sql.chars();
    let head: String = chars.by_ref().take(CONTEXT_SQL_CHARS).collect();
    if chars.next().is_some() {
        format!("executing: {}...", head)
    } else {
        format!("executing: {}", head)
    }
}

/// Shared deadpool-postgres pool.
#[derive(Clone)]
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Build a pool from configuration and test one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("schema-rules");

        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let pool = match tls::connector(ssl_mode)? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| SchemaError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls_connector) => {
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| SchemaError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let pool = Self { pool };
        pool.health_check().await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(pool)
    }

    /// Check out a pooled connection.
    pub async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SchemaError::pool(e, "getting PostgreSQL connection"))
    }

    /// Round-trip `SELECT 1` on a pooled connection.
    pub async fn health_check(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), "health check"))?;
        Ok(())
    }

    /// Close the pool; checked-out connections are dropped when returned.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl Executor for PgPool {
    async fn execute(&self, stmt: &Statement) -> Result<u64> {
        let client = self.client().await?;
        debug!("{}", stmt);
        client
            .execute(stmt.sql.as_str(), &stmt.pg_params())
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), statement_context(stmt)))
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        let client = self.client().await?;
        client
            .query(stmt.sql.as_str(), &stmt.pg_params())
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), statement_context(stmt)))
    }

    async fn execute_all(&self, stmts: &[Statement]) -> Result<()> {
        // One connection for the whole batch keeps session state consistent.
        let client = self.client().await?;
        for stmt in stmts {
            debug!("{}", stmt);
            client
                .execute(stmt.sql.as_str(), &stmt.pg_params())
                .await
                .map_err(|e| {
                    SchemaError::infrastructure(describe_pg_error(&e), statement_context(stmt))
                })?;
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "pool"
    }
}

/// A transaction on a checked-out connection.
///
/// Dropping it without [`commit`](Self::commit) rolls back.
pub struct PgTransaction<'a> {
    tx: tokio_postgres::Transaction<'a>,
}

impl<'a> PgTransaction<'a> {
    /// Open a transaction on `client`.
    pub async fn begin(client: &'a mut Object) -> Result<Self> {
        let tx = tokio_postgres::Client::transaction(client)
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), "beginning transaction"))?;
        Ok(Self { tx })
    }

    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), "committing transaction"))
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), "rolling back transaction"))
    }
}

#[async_trait]
impl Executor for PgTransaction<'_> {
    async fn execute(&self, stmt: &Statement) -> Result<u64> {
        debug!("{}", stmt);
        self.tx
            .execute(stmt.sql.as_str(), &stmt.pg_params())
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), statement_context(stmt)))
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        self.tx
            .query(stmt.sql.as_str(), &stmt.pg_params())
            .await
            .map_err(|e| SchemaError::infrastructure(describe_pg_error(&e), statement_context(stmt)))
    }

    fn kind(&self) -> &'static str {
        "transaction"
    }
}
