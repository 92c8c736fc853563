//! Async SQLite connection backed by `sqlx`.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use relmig_core::DriverError;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Row, SqliteConnection};

use crate::sqlx_backend::{SqlxConnection, SqlxSession, SqlxTransaction};

/// An async connection to an SQLite database.
pub type AsyncSqliteConnection = SqlxConnection<SqliteConnection>;

/// Transaction on an [`AsyncSqliteConnection`].
pub type AsyncSqliteTransaction = SqlxTransaction<SqliteConnection>;

impl SqlxConnection<SqliteConnection> {
    /// Create a closed connection from a `sqlite:` URL.
    ///
    /// The database file is created on open if it does not exist.
    pub fn new(url: &str) -> Result<Self, DriverError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(DriverError::driver)?
            .create_if_missing(true);
        Ok(Self::with_options(options))
    }

    /// Create a closed connection to the database file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::with_options(options)
    }
}

#[async_trait]
impl SqlxSession for SqliteConnection {
    type Options = SqliteConnectOptions;

    const DATABASE: &'static str = "SQLite";

    async fn connect(options: &SqliteConnectOptions) -> Result<Self, sqlx::Error> {
        options.connect().await
    }

    // `changes()` keeps the count of the last DML statement, so DDL would
    // repeat it. The difference in `total_changes()` is exact.
    async fn run(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let before = total_changes(self).await?;
        sqlx::Executor::execute(&mut *self, sql).await?;
        let after = total_changes(self).await?;
        Ok(after.saturating_sub(before))
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        sqlx::Connection::close(self).await
    }
}

async fn total_changes(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let row = sqlx::Executor::fetch_one(&mut *conn, "SELECT total_changes()").await?;
    let total: i64 = row.try_get(0)?;
    Ok(total as u64)
}
