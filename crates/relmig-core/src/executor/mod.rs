//! Migration command executor.
//!
//! Applies an ordered sequence of [`MigrationCommand`]s to one connection:
//!
//! - contiguous non-suppressed commands run inside a single transaction,
//!   committed only if every command in the run succeeds
//! - suppressed commands run with no transaction active
//! - the first failure aborts the remaining commands
//! - the connection is closed and the ambient-transaction scope released on
//!   every exit path
//!
//! # Example
//!
//! ```ignore
//! use relmig_core::{MigrationCommand, MigrationCommandExecutor};
//!
//! let executor = MigrationCommandExecutor::default();
//! let commands = vec![
//!     MigrationCommand::new("CREATE TABLE t (id INTEGER)"),
//!     MigrationCommand::suppressed("VACUUM"),
//!     MigrationCommand::new("INSERT INTO t VALUES (1)"),
//! ];
//!
//! let report = executor.execute(&commands, &mut connection)?;
//! assert_eq!(report.transactions_committed, 2);
//! ```

mod asynchronous;
mod blocking;
pub mod plan;

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::command::MigrationCommand;
use crate::error::{DriverError, ExecutorError};

pub use plan::{Batch, ExecutionPlan, PlanStep};

/// Default number of characters of command text written to logs.
pub const DEFAULT_MAX_LOGGED_TEXT: usize = 200;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether command text is included in debug logs.
    pub log_command_text: bool,
    /// Maximum number of characters of command text written to logs.
    pub max_logged_text: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            log_command_text: false,
            max_logged_text: DEFAULT_MAX_LOGGED_TEXT,
        }
    }
}

impl ExecutorConfig {
    /// Enable or disable logging of command text.
    pub fn with_command_logging(mut self, enabled: bool) -> Self {
        self.log_command_text = enabled;
        self
    }

    /// Set the maximum number of characters of command text written to logs.
    pub fn with_max_logged_text(mut self, max: usize) -> Self {
        self.max_logged_text = max;
        self
    }
}

/// Summary of a successful execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Number of commands executed.
    pub commands_executed: usize,
    /// Number of commands executed outside a transaction.
    pub suppressed_commands: usize,
    /// Number of transactions committed.
    pub transactions_committed: usize,
    /// Total rows affected as reported by the connection.
    pub rows_affected: u64,
    /// Wall-clock duration of the execution.
    pub elapsed: Duration,
}

impl ExecutionReport {
    fn record_command(&mut self, command: &MigrationCommand, rows: u64) {
        self.commands_executed += 1;
        if command.transaction_suppressed() {
            self.suppressed_commands += 1;
        }
        self.rows_affected += rows;
    }
}

/// Executes migration commands against a connection.
///
/// The executor holds only configuration. All state of an execution lives in
/// the call, so one executor can serve any number of concurrent executions
/// on independent connections.
#[derive(Debug, Clone, Default)]
pub struct MigrationCommandExecutor {
    config: ExecutorConfig,
}

impl MigrationCommandExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn log_command(&self, index: usize, command: &MigrationCommand) {
        let suppressed = command.transaction_suppressed();
        if self.config.log_command_text {
            debug!(
                index,
                suppressed,
                text = %preview(command.command_text(), self.config.max_logged_text),
                "Executing command"
            );
        } else {
            debug!(index, suppressed, "Executing command");
        }
    }

    fn finish(
        &self,
        result: Result<ExecutionReport, ExecutorError>,
        start: Instant,
    ) -> Result<ExecutionReport, ExecutorError> {
        match result {
            Ok(mut report) => {
                report.elapsed = start.elapsed();
                info!(
                    commands = report.commands_executed,
                    suppressed = report.suppressed_commands,
                    transactions = report.transactions_committed,
                    rows_affected = report.rows_affected,
                    duration_ms = report.elapsed.as_millis() as u64,
                    "Migration commands applied"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Migration commands failed");
                Err(e)
            }
        }
    }
}

/// Combine the outcome of the work with the outcome of closing the connection.
///
/// An earlier failure wins over a close failure.
fn merge_close(
    result: Result<ExecutionReport, ExecutorError>,
    closed: Result<(), DriverError>,
) -> Result<ExecutionReport, ExecutorError> {
    match (result, closed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(ExecutorError::Close(e)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_error)) => {
            warn!(error = %close_error, "Failed to close connection after error");
            Err(e)
        }
    }
}

fn command_error(index: usize, command: &MigrationCommand, source: DriverError) -> ExecutorError {
    ExecutorError::Command {
        index,
        suppressed: command.transaction_suppressed(),
        source,
    }
}

fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let mut out: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}
