//! Async driver with cooperative cancellation.

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::plan::{ExecutionPlan, PlanStep};
use super::{command_error, merge_close, ExecutionReport, MigrationCommandExecutor};
use crate::ambient::SuppressionScope;
use crate::command::MigrationCommand;
use crate::connection::{AsyncConnection, AsyncTransaction};
use crate::error::{DriverError, ExecutorError};

impl MigrationCommandExecutor {
    /// Execute `commands` against `connection` without blocking.
    ///
    /// `cancel` is passed to the open, begin-transaction and execute calls,
    /// which are also abandoned as soon as it fires. It is checked before
    /// each of those steps, never before a commit. A cancelled execution
    /// still rolls back the active transaction, closes the connection and
    /// reports [`ExecutorError::Cancelled`].
    #[instrument(skip_all, fields(commands = commands.len()))]
    pub async fn execute_async<C: AsyncConnection>(
        &self,
        commands: &[MigrationCommand],
        connection: &mut C,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ExecutorError> {
        let plan = ExecutionPlan::build(commands)?;
        let start = Instant::now();

        let mut scope = SuppressionScope::enter(connection);
        let result = self
            .run_async(&plan, commands, scope.connection(), cancel)
            .await;
        scope.release();

        self.finish(result, start)
    }

    async fn run_async<C: AsyncConnection>(
        &self,
        plan: &ExecutionPlan,
        commands: &[MigrationCommand],
        connection: &mut C,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ExecutorError> {
        cancellable(cancel, connection.open(cancel))
            .await
            .map_err(|e| or_cancelled(e, ExecutorError::Open))?;

        let mut transaction = None;
        let result = self
            .walk_async(plan, commands, connection, &mut transaction, cancel)
            .await;
        if let Some(transaction) = transaction.take() {
            debug!("Disposing uncommitted transaction");
            transaction.dispose().await;
        }

        let closed = connection.close().await;
        merge_close(result, closed)
    }

    async fn walk_async<C: AsyncConnection>(
        &self,
        plan: &ExecutionPlan,
        commands: &[MigrationCommand],
        connection: &mut C,
        transaction: &mut Option<C::Transaction>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport, ExecutorError> {
        let mut report = ExecutionReport::default();

        for step in plan.steps() {
            // A run whose commands all succeeded is still committed; the next
            // begin or execute observes the cancellation.
            let commit = matches!(step, PlanStep::CommitTransaction);
            if !commit && cancel.is_cancelled() {
                debug!("Cancellation observed between steps");
                return Err(ExecutorError::Cancelled);
            }

            match *step {
                PlanStep::BeginTransaction => {
                    debug!("Beginning transaction");
                    let begun = cancellable(cancel, connection.begin_transaction(cancel))
                        .await
                        .map_err(|e| or_cancelled(e, ExecutorError::Begin))?;
                    *transaction = Some(begun);
                }
                PlanStep::CommitTransaction => {
                    if let Some(mut active) = transaction.take() {
                        debug!("Committing transaction");
                        let committed = active.commit().await;
                        active.dispose().await;
                        committed.map_err(ExecutorError::Commit)?;
                        report.transactions_committed += 1;
                    }
                }
                PlanStep::Execute(index) => {
                    let command = &commands[index];
                    self.log_command(index, command);
                    let rows = cancellable(cancel, connection.execute(command, cancel))
                        .await
                        .map_err(|e| or_cancelled(e, |source| command_error(index, command, source)))?;
                    report.record_command(command, rows);
                }
            }
        }

        Ok(report)
    }
}

/// Run `operation` unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    if cancel.is_cancelled() {
        return Err(DriverError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DriverError::Cancelled),
        result = operation => result,
    }
}

fn or_cancelled(
    err: DriverError,
    wrap: impl FnOnce(DriverError) -> ExecutorError,
) -> ExecutorError {
    match err {
        DriverError::Cancelled => ExecutorError::Cancelled,
        other => wrap(other),
    }
}
