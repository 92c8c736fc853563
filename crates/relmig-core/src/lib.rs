//! relmig Core - transactional execution of migration commands.
//!
//! This crate applies an ordered sequence of schema-change commands to a
//! relational database as an atomic-as-possible unit. Commands that must not
//! run inside a transaction split the sequence into separately committed
//! transactional runs.
//!
//! # Quick Start
//!
//! ```ignore
//! use relmig_core::{MigrationCommandExecutor, MigrationScript};
//! use tokio_util::sync::CancellationToken;
//!
//! let commands = MigrationScript::from_file("migrations/001_init.sql")?;
//! let executor = MigrationCommandExecutor::default();
//!
//! // Blocking
//! executor.execute(&commands, &mut connection)?;
//!
//! // Async, cancellable
//! let cancel = CancellationToken::new();
//! executor.execute_async(&commands, &mut async_connection, &cancel).await?;
//! ```

pub mod ambient;
pub mod command;
pub mod connection;
pub mod error;
pub mod executor;
pub mod script;

pub use ambient::{AmbientTransaction, Enlistment, SuppressionScope};
pub use command::{MigrationCommand, MigrationCommandListBuilder};
pub use connection::{AsyncConnection, AsyncTransaction, Connection, Transaction};
pub use error::{BoxError, DriverError, ExecutorError};
pub use executor::{
    Batch, ExecutionPlan, ExecutionReport, ExecutorConfig, MigrationCommandExecutor, PlanStep,
};
pub use script::{MigrationScript, ScriptError};

/// Re-export of the cancellation token accepted by the async driver.
pub use tokio_util::sync::CancellationToken;
