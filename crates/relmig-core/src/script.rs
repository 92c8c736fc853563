//! Plain-text migration scripts.
//!
//! A script is a sequence of commands separated by `GO` lines. A command
//! containing the directive line `-- relmig:no-transaction` runs outside any
//! transaction:
//!
//! ```text
//! CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
//! GO
//! -- relmig:no-transaction
//! VACUUM;
//! GO
//! INSERT INTO users (name) VALUES ('admin');
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::command::{MigrationCommand, MigrationCommandListBuilder};

/// Batch separator line.
pub const SEPARATOR: &str = "GO";

/// Directive marking a command as transaction-suppressed.
pub const NO_TRANSACTION_DIRECTIVE: &str = "relmig:no-transaction";

/// Errors loading a migration script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("failed to read script {path}: {source}")]
    Io {
        /// Path of the script.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Parser for migration scripts.
pub struct MigrationScript;

impl MigrationScript {
    /// Parse script text into an ordered list of commands.
    pub fn parse(text: &str) -> Vec<MigrationCommand> {
        let mut builder = MigrationCommandListBuilder::new();
        let mut suppressed = false;

        for line in text.lines() {
            if is_separator(line) {
                builder.end_command(suppressed);
                suppressed = false;
            } else if is_no_transaction_directive(line) {
                suppressed = true;
            } else {
                builder.append_line(line);
            }
        }

        builder.end_command(suppressed);
        builder.build()
    }

    /// Read and parse a script file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Vec<MigrationCommand>, ScriptError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }
}

fn is_separator(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(SEPARATOR)
}

fn is_no_transaction_directive(line: &str) -> bool {
    line.trim()
        .strip_prefix("--")
        .map(|rest| rest.trim().eq_ignore_ascii_case(NO_TRANSACTION_DIRECTIVE))
        .unwrap_or(false)
}
