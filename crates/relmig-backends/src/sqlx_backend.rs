//! Async connection over any `sqlx` database session.
//!
//! The database-specific parts (connecting, running raw SQL, counting rows)
//! live behind [`SqlxSession`]; everything else is shared.

use std::sync::Arc;

use async_trait::async_trait;
use relmig_core::{
    AsyncConnection, AsyncTransaction, CancellationToken, DriverError, Enlistment,
    MigrationCommand,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A raw `sqlx` session the executor can drive.
#[async_trait]
pub trait SqlxSession: Send + Sized + 'static {
    /// Options used to open a session.
    type Options: Send + Sync;

    /// Database name used in log messages.
    const DATABASE: &'static str;

    /// Open a new session.
    async fn connect(options: &Self::Options) -> Result<Self, sqlx::Error>;

    /// Run one or more SQL statements and return the number of rows changed.
    async fn run(&mut self, sql: &str) -> Result<u64, sqlx::Error>;

    /// Close the session.
    async fn close(self) -> Result<(), sqlx::Error>;
}

type Session<S> = Arc<Mutex<Option<S>>>;

/// An async connection backed by a `sqlx` session.
///
/// The session is shared with the transaction handle, so a transaction can
/// commit or roll back without borrowing the connection.
pub struct SqlxConnection<S: SqlxSession> {
    options: S::Options,
    session: Session<S>,
    open: bool,
}

impl<S: SqlxSession> SqlxConnection<S> {
    /// Create a closed connection that opens with `options`.
    pub fn with_options(options: S::Options) -> Self {
        Self {
            options,
            session: Arc::new(Mutex::new(None)),
            open: false,
        }
    }
}

impl<S: SqlxSession> Enlistment for SqlxConnection<S> {}

#[async_trait]
impl<S: SqlxSession> AsyncConnection for SqlxConnection<S> {
    type Transaction = SqlxTransaction<S>;

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self, cancel: &CancellationToken) -> Result<(), DriverError> {
        if self.open {
            return Ok(());
        }

        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DriverError::Cancelled),
            result = S::connect(&self.options) => result.map_err(DriverError::driver)?,
        };
        *self.session.lock().await = Some(conn);
        self.open = true;

        debug!(database = S::DATABASE, "Opened connection");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.open = false;
        if let Some(conn) = self.session.lock().await.take() {
            conn.close().await.map_err(DriverError::driver)?;
            debug!(database = S::DATABASE, "Closed connection");
        }
        Ok(())
    }

    async fn begin_transaction(
        &mut self,
        _cancel: &CancellationToken,
    ) -> Result<SqlxTransaction<S>, DriverError> {
        {
            let mut session = self.session.lock().await;
            let conn = session.as_mut().ok_or(DriverError::NotOpen)?;
            conn.run("BEGIN").await.map_err(DriverError::driver)?;
        }

        Ok(SqlxTransaction {
            session: Arc::clone(&self.session),
            finished: false,
        })
    }

    async fn execute(
        &mut self,
        command: &MigrationCommand,
        _cancel: &CancellationToken,
    ) -> Result<u64, DriverError> {
        let mut session = self.session.lock().await;
        let conn = session.as_mut().ok_or(DriverError::NotOpen)?;

        conn.run(command.command_text())
            .await
            .map_err(DriverError::driver)
    }
}

/// Transaction on a [`SqlxConnection`].
pub struct SqlxTransaction<S: SqlxSession> {
    session: Session<S>,
    finished: bool,
}

#[async_trait]
impl<S: SqlxSession> AsyncTransaction for SqlxTransaction<S> {
    async fn commit(&mut self) -> Result<(), DriverError> {
        let mut session = self.session.lock().await;
        let conn = session.as_mut().ok_or(DriverError::NotOpen)?;

        conn.run("COMMIT").await.map_err(DriverError::driver)?;
        self.finished = true;
        Ok(())
    }

    async fn dispose(mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let mut session = self.session.lock().await;
        let Some(conn) = session.as_mut() else {
            return;
        };
        // An aborted PostgreSQL transaction still accepts ROLLBACK.
        match conn.run("ROLLBACK").await {
            Ok(_) => debug!(database = S::DATABASE, "Rolled back transaction"),
            Err(e) => warn!(
                database = S::DATABASE,
                error = %e,
                "Failed to roll back transaction"
            ),
        }
    }
}

impl<S: SqlxSession> Drop for SqlxTransaction<S> {
    fn drop(&mut self) {
        // Rollback needs an await; closing the connection discards the work.
        if !self.finished {
            warn!(database = S::DATABASE, "Transaction dropped without dispose");
        }
    }
}
