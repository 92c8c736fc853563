//! Async PostgreSQL connection backed by `sqlx`.
//!
//! Enable with `--features postgres`.

use std::str::FromStr;

use async_trait::async_trait;
use relmig_core::DriverError;
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, PgConnection};

use crate::sqlx_backend::{SqlxConnection, SqlxSession, SqlxTransaction};

/// An async connection to a PostgreSQL server.
///
/// Statements such as `CREATE INDEX CONCURRENTLY` or `ALTER TYPE ... ADD VALUE`
/// are rejected inside a transaction block and must be sent as suppressed
/// commands.
pub type PostgresConnection = SqlxConnection<PgConnection>;

/// Transaction on a [`PostgresConnection`].
pub type PostgresTransaction = SqlxTransaction<PgConnection>;

impl SqlxConnection<PgConnection> {
    /// Create a closed connection from a `postgres://` URL.
    pub fn new(url: &str) -> Result<Self, DriverError> {
        let options = PgConnectOptions::from_str(url).map_err(DriverError::driver)?;
        Ok(Self::with_options(options))
    }
}

#[async_trait]
impl SqlxSession for PgConnection {
    type Options = PgConnectOptions;

    const DATABASE: &'static str = "PostgreSQL";

    async fn connect(options: &PgConnectOptions) -> Result<Self, sqlx::Error> {
        options.connect().await
    }

    // Without bind arguments sqlx uses the simple query protocol, which
    // accepts several statements. DDL reports no row count.
    async fn run(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::Executor::execute(&mut *self, sql).await?;
        Ok(result.rows_affected())
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        sqlx::Connection::close(self).await
    }
}
