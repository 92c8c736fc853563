//! Error types for migration execution.

use thiserror::Error;

/// Boxed error produced by an underlying database driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a connection or transaction implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The connection is not open.
    #[error("connection is not open")]
    NotOpen,

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// Error raised by the database driver, carried unchanged.
    #[error(transparent)]
    Driver(BoxError),
}

impl DriverError {
    /// Wrap a driver error.
    pub fn driver(err: impl Into<BoxError>) -> Self {
        Self::Driver(err.into())
    }

    /// Attempt to view the underlying driver error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Driver(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Errors surfaced by [`MigrationCommandExecutor`](crate::MigrationCommandExecutor).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The command sequence was rejected before any I/O took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Opening the connection failed. The connection was never opened.
    #[error("failed to open connection: {0}")]
    Open(#[source] DriverError),

    /// Beginning a transaction failed.
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] DriverError),

    /// A command failed. Later commands were not executed.
    #[error("command {index} failed{}: {source}", run_context(.suppressed))]
    Command {
        /// Position of the failed command in the input sequence.
        index: usize,
        /// Whether the command ran with no active transaction.
        suppressed: bool,
        /// The driver error.
        #[source]
        source: DriverError,
    },

    /// Committing a transaction failed.
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] DriverError),

    /// Closing the connection failed after all work completed.
    #[error("failed to close connection: {0}")]
    Close(#[source] DriverError),

    /// The async execution was cancelled.
    #[error("migration execution cancelled")]
    Cancelled,
}

fn run_context(suppressed: &bool) -> &'static str {
    if *suppressed {
        " (outside transaction)"
    } else {
        ""
    }
}

impl ExecutorError {
    /// Check if this error is the result of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the failure happened while a transaction was active.
    ///
    /// Work inside that transaction was rolled back.
    pub fn is_transactional(&self) -> bool {
        match self {
            Self::Begin(_) | Self::Commit(_) => true,
            Self::Command { suppressed, .. } => !suppressed,
            _ => false,
        }
    }

    /// The driver error behind this failure, if any.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Open(e) | Self::Begin(e) | Self::Commit(e) | Self::Close(e) => Some(e),
            Self::Command { source, .. } => Some(source),
            Self::InvalidArgument(_) | Self::Cancelled => None,
        }
    }
}
