//! Blocking driver.

use std::time::Instant;

use tracing::{debug, instrument};

use super::plan::{ExecutionPlan, PlanStep};
use super::{command_error, merge_close, ExecutionReport, MigrationCommandExecutor};
use crate::ambient::SuppressionScope;
use crate::command::MigrationCommand;
use crate::connection::{Connection, Transaction};
use crate::error::ExecutorError;

impl MigrationCommandExecutor {
    /// Execute `commands` against `connection`, blocking the calling thread.
    ///
    /// The connection is opened if needed and is closed on return, whether
    /// the execution succeeded or not. If opening fails, no close is
    /// attempted.
    #[instrument(skip_all, fields(commands = commands.len()))]
    pub fn execute<C: Connection>(
        &self,
        commands: &[MigrationCommand],
        connection: &mut C,
    ) -> Result<ExecutionReport, ExecutorError> {
        let plan = ExecutionPlan::build(commands)?;
        let start = Instant::now();

        let mut scope = SuppressionScope::enter(connection);
        let result = self.run_blocking(&plan, commands, scope.connection());
        scope.release();

        self.finish(result, start)
    }

    fn run_blocking<C: Connection>(
        &self,
        plan: &ExecutionPlan,
        commands: &[MigrationCommand],
        connection: &mut C,
    ) -> Result<ExecutionReport, ExecutorError> {
        connection.open().map_err(ExecutorError::Open)?;

        let mut transaction = None;
        let result = self.walk_blocking(plan, commands, connection, &mut transaction);
        if let Some(transaction) = transaction.take() {
            debug!("Disposing uncommitted transaction");
            transaction.dispose();
        }

        let closed = connection.close();
        merge_close(result, closed)
    }

    fn walk_blocking<C: Connection>(
        &self,
        plan: &ExecutionPlan,
        commands: &[MigrationCommand],
        connection: &mut C,
        transaction: &mut Option<C::Transaction>,
    ) -> Result<ExecutionReport, ExecutorError> {
        let mut report = ExecutionReport::default();

        for step in plan.steps() {
            match *step {
                PlanStep::BeginTransaction => {
                    debug!("Beginning transaction");
                    let begun = connection.begin_transaction().map_err(ExecutorError::Begin)?;
                    *transaction = Some(begun);
                }
                PlanStep::CommitTransaction => {
                    if let Some(mut active) = transaction.take() {
                        debug!("Committing transaction");
                        let committed = active.commit();
                        active.dispose();
                        committed.map_err(ExecutorError::Commit)?;
                        report.transactions_committed += 1;
                    }
                }
                PlanStep::Execute(index) => {
                    let command = &commands[index];
                    self.log_command(index, command);
                    let rows = connection
                        .execute(command)
                        .map_err(|source| command_error(index, command, source))?;
                    report.record_command(command, rows);
                }
            }
        }

        Ok(report)
    }
}
