//! Executors: the PostgreSQL pool and transactions, plus a recorder for dry runs.

mod postgres;
mod recording;
mod tls;

pub use postgres::{PgPool, PgTransaction};
pub use recording::RecordingExecutor;
pub use tls::SslMode;
