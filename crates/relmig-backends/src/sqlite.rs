//! Blocking SQLite connection backed by `rusqlite`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relmig_core::{Connection, DriverError, Enlistment, MigrationCommand, Transaction};
use tracing::{debug, warn};

/// Default time to wait on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Session = Arc<Mutex<Option<rusqlite::Connection>>>;

/// A blocking connection to an SQLite database file.
///
/// The underlying session is shared with the transaction handle, so a
/// transaction can commit or roll back without borrowing the connection.
pub struct SqliteConnection {
    path: PathBuf,
    busy_timeout: Duration,
    session: Session,
}

impl SqliteConnection {
    /// Create a closed connection to the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Set how long to wait on a locked database.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Enlistment for SqliteConnection {}

impl Connection for SqliteConnection {
    type Transaction = SqliteTransaction;

    fn is_open(&self) -> bool {
        self.session.lock().is_some()
    }

    fn open(&mut self) -> Result<(), DriverError> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Ok(());
        }

        let conn = rusqlite::Connection::open(&self.path).map_err(DriverError::driver)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(DriverError::driver)?;
        *session = Some(conn);

        debug!(path = %self.path.display(), "Opened SQLite connection");
        Ok(())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if let Some(conn) = self.session.lock().take() {
            conn.close().map_err(|(_, e)| DriverError::driver(e))?;
            debug!(path = %self.path.display(), "Closed SQLite connection");
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<SqliteTransaction, DriverError> {
        {
            let session = self.session.lock();
            let conn = session.as_ref().ok_or(DriverError::NotOpen)?;
            conn.execute_batch("BEGIN").map_err(DriverError::driver)?;
        }

        Ok(SqliteTransaction {
            session: Arc::clone(&self.session),
            finished: false,
        })
    }

    fn execute(&mut self, command: &MigrationCommand) -> Result<u64, DriverError> {
        let session = self.session.lock();
        let conn = session.as_ref().ok_or(DriverError::NotOpen)?;

        let before = total_changes(conn)?;
        conn.execute_batch(command.command_text())
            .map_err(DriverError::driver)?;
        let after = total_changes(conn)?;
        Ok(after.saturating_sub(before))
    }
}

// `changes()` keeps the count of the last DML statement, so DDL would repeat
// it. The difference in `total_changes()` is exact.
fn total_changes(conn: &rusqlite::Connection) -> Result<u64, DriverError> {
    conn.query_row("SELECT total_changes()", [], |row| row.get::<_, i64>(0))
        .map(|total| total as u64)
        .map_err(DriverError::driver)
}

/// Transaction on a [`SqliteConnection`].
///
/// Dropping an unfinished transaction rolls it back.
pub struct SqliteTransaction {
    session: Session,
    finished: bool,
}

impl SqliteTransaction {
    fn rollback(&mut self) {
        self.finished = true;

        let session = self.session.lock();
        let Some(conn) = session.as_ref() else {
            return;
        };
        if conn.is_autocommit() {
            return;
        }

        match conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Rolled back SQLite transaction"),
            Err(e) => warn!(error = %e, "Failed to roll back SQLite transaction"),
        }
    }
}

impl Transaction for SqliteTransaction {
    fn commit(&mut self) -> Result<(), DriverError> {
        let session = self.session.lock();
        let conn = session.as_ref().ok_or(DriverError::NotOpen)?;

        conn.execute_batch("COMMIT").map_err(DriverError::driver)?;
        self.finished = true;
        Ok(())
    }

    fn dispose(self) {
        drop(self);
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
    }
}
