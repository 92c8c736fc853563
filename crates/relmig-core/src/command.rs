//! Migration commands and the command-list builder.

use serde::Serialize;
use std::fmt;

/// A single unit of migration work.
///
/// Commands are immutable once constructed. A command marked as
/// transaction-suppressed always runs with no transaction active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MigrationCommand {
    command_text: String,
    transaction_suppressed: bool,
}

impl MigrationCommand {
    /// Create a command that runs inside a transaction.
    pub fn new(command_text: impl Into<String>) -> Self {
        Self::with_transaction_suppressed(command_text, false)
    }

    /// Create a command that must run outside any transaction.
    pub fn suppressed(command_text: impl Into<String>) -> Self {
        Self::with_transaction_suppressed(command_text, true)
    }

    /// Create a command with an explicit suppression flag.
    pub fn with_transaction_suppressed(
        command_text: impl Into<String>,
        transaction_suppressed: bool,
    ) -> Self {
        Self {
            command_text: command_text.into(),
            transaction_suppressed,
        }
    }

    /// The statement text sent to the database.
    pub fn command_text(&self) -> &str {
        &self.command_text
    }

    /// Whether this command must run outside a transaction.
    pub fn transaction_suppressed(&self) -> bool {
        self.transaction_suppressed
    }

    /// Check if the command text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.command_text.trim().is_empty()
    }
}

impl fmt::Display for MigrationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_text)
    }
}

/// Builds a list of [`MigrationCommand`]s from text appended piece by piece.
///
/// # Example
///
/// ```
/// use relmig_core::MigrationCommandListBuilder;
///
/// let mut builder = MigrationCommandListBuilder::new();
/// builder.append_line("CREATE TABLE t (id INTEGER)");
/// builder.end_command(false);
/// builder.append("VACUUM");
/// builder.end_command(true);
///
/// let commands = builder.build();
/// assert_eq!(commands.len(), 2);
/// assert!(commands[1].transaction_suppressed());
/// ```
#[derive(Debug, Default)]
pub struct MigrationCommandListBuilder {
    commands: Vec<MigrationCommand>,
    buffer: String,
}

impl MigrationCommandListBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text to the current command.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.buffer.push_str(text);
        self
    }

    /// Append text followed by a newline.
    pub fn append_line(&mut self, text: &str) -> &mut Self {
        self.buffer.push_str(text);
        self.buffer.push('\n');
        self
    }

    /// Append each line of `text` as its own line.
    pub fn append_lines(&mut self, text: &str) -> &mut Self {
        for line in text.lines() {
            self.append_line(line);
        }
        self
    }

    /// Finish the current command.
    ///
    /// Blank text produces no command.
    pub fn end_command(&mut self, suppress_transaction: bool) -> &mut Self {
        let text = std::mem::take(&mut self.buffer);
        let text = text.trim_end();
        if !text.trim().is_empty() {
            self.commands.push(MigrationCommand::with_transaction_suppressed(
                text,
                suppress_transaction,
            ));
        }
        self
    }

    /// Number of finished commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if no command has been finished yet.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Finish any pending text as a transactional command and return the list.
    pub fn build(mut self) -> Vec<MigrationCommand> {
        self.end_command(false);
        self.commands
    }
}
