//! Transaction batching for a command sequence.
//!
//! The plan is the single description of how commands are grouped into
//! transactions. Both executor drivers walk the same steps.

use serde::Serialize;

use crate::command::MigrationCommand;
use crate::error::ExecutorError;

/// One step of an execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "index", rename_all = "snake_case")]
pub enum PlanStep {
    /// Begin a transaction.
    BeginTransaction,
    /// Execute the command at this position of the input sequence.
    Execute(usize),
    /// Commit and release the current transaction.
    CommitTransaction,
}

/// A maximal run of commands sharing the same transactional treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    /// Index of the first command in the run.
    pub start: usize,
    /// Index one past the last command in the run.
    pub end: usize,
    /// Whether the run executes inside a single transaction.
    pub transactional: bool,
}

impl Batch {
    /// Number of commands in the run.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the run is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Execution plan for an ordered command sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
    batches: Vec<Batch>,
}

impl ExecutionPlan {
    /// Build the plan for `commands`.
    ///
    /// A transaction begins before the first command of every non-suppressed
    /// run and is committed before the next suppressed command, or after the
    /// last command. Commands keep their input order.
    pub fn build(commands: &[MigrationCommand]) -> Result<Self, ExecutorError> {
        if let Some(index) = commands.iter().position(MigrationCommand::is_blank) {
            return Err(ExecutorError::InvalidArgument(format!(
                "command {} has no command text",
                index
            )));
        }

        let mut steps = Vec::with_capacity(commands.len() + 2);
        let mut in_transaction = false;

        for (index, command) in commands.iter().enumerate() {
            let suppressed = command.transaction_suppressed();

            if !in_transaction && !suppressed {
                steps.push(PlanStep::BeginTransaction);
                in_transaction = true;
            }

            if in_transaction && suppressed {
                steps.push(PlanStep::CommitTransaction);
                in_transaction = false;
            }

            steps.push(PlanStep::Execute(index));
        }

        if in_transaction {
            steps.push(PlanStep::CommitTransaction);
        }

        Ok(Self {
            steps,
            batches: group_batches(commands),
        })
    }

    /// The ordered steps.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// The runs of commands, in order.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Number of transactions the plan opens.
    pub fn transaction_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PlanStep::BeginTransaction))
            .count()
    }

    /// Number of commands the plan executes.
    pub fn command_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PlanStep::Execute(_)))
            .count()
    }
}

fn group_batches(commands: &[MigrationCommand]) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();

    for (index, command) in commands.iter().enumerate() {
        let transactional = !command.transaction_suppressed();
        match batches.last_mut() {
            Some(batch) if batch.transactional == transactional => batch.end = index + 1,
            _ => batches.push(Batch {
                start: index,
                end: index + 1,
                transactional,
            }),
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use PlanStep::*;

    fn tx(text: &str) -> MigrationCommand {
        MigrationCommand::new(text)
    }

    fn bare(text: &str) -> MigrationCommand {
        MigrationCommand::suppressed(text)
    }

    #[test]
    fn test_all_transactional() {
        let plan = ExecutionPlan::build(&[tx("a"), tx("b"), tx("c")]).unwrap();
        assert_eq!(
            plan.steps(),
            &[BeginTransaction, Execute(0), Execute(1), Execute(2), CommitTransaction]
        );
        assert_eq!(plan.transaction_count(), 1);
    }

    #[test]
    fn test_all_suppressed() {
        let plan = ExecutionPlan::build(&[bare("a"), bare("b")]).unwrap();
        assert_eq!(plan.steps(), &[Execute(0), Execute(1)]);
        assert_eq!(plan.transaction_count(), 0);
        assert_eq!(
            plan.batches(),
            &[Batch {
                start: 0,
                end: 2,
                transactional: false
            }]
        );
    }

    #[test]
    fn test_suppressed_command_splits_transactions() {
        let plan = ExecutionPlan::build(&[tx("A"), tx("B"), bare("C"), tx("D")]).unwrap();
        assert_eq!(
            plan.steps(),
            &[
                BeginTransaction,
                Execute(0),
                Execute(1),
                CommitTransaction,
                Execute(2),
                BeginTransaction,
                Execute(3),
                CommitTransaction,
            ]
        );
        assert_eq!(plan.transaction_count(), 2);
        assert_eq!(plan.command_count(), 4);

        let lens: Vec<_> = plan.batches().iter().map(Batch::len).collect();
        assert_eq!(lens, vec![2, 1, 1]);
    }

    #[test]
    fn test_leading_and_trailing_suppressed() {
        let plan = ExecutionPlan::build(&[bare("a"), tx("b"), bare("c")]).unwrap();
        assert_eq!(
            plan.steps(),
            &[Execute(0), BeginTransaction, Execute(1), CommitTransaction, Execute(2)]
        );
    }

    #[test]
    fn test_empty_sequence() {
        let plan = ExecutionPlan::build(&[]).unwrap();
        assert!(plan.steps().is_empty());
        assert!(plan.batches().is_empty());
    }

    #[test]
    fn test_blank_command_is_rejected() {
        let result = ExecutionPlan::build(&[tx("a"), tx("   ")]);
        match result {
            Err(ExecutorError::InvalidArgument(message)) => {
                assert_eq!(message, "command 1 has no command text")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
