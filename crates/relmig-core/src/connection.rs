//! Connection and transaction contracts consumed by the executor.
//!
//! Two families are provided: blocking ([`Connection`], [`Transaction`]) and
//! async ([`AsyncConnection`], [`AsyncTransaction`]). Both extend
//! [`Enlistment`] so the executor can keep them out of ambient transactions.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ambient::Enlistment;
use crate::command::MigrationCommand;
use crate::error::DriverError;

/// A blocking database connection.
pub trait Connection: Enlistment {
    /// Transaction handle returned by [`begin_transaction`](Self::begin_transaction).
    type Transaction: Transaction;

    /// Check if the connection is open.
    fn is_open(&self) -> bool;

    /// Open the connection. Opening an open connection is a no-op.
    fn open(&mut self) -> Result<(), DriverError>;

    /// Close the connection.
    fn close(&mut self) -> Result<(), DriverError>;

    /// Begin a new transaction on this connection.
    fn begin_transaction(&mut self) -> Result<Self::Transaction, DriverError>;

    /// Execute a command, returning the number of rows affected.
    fn execute(&mut self, command: &MigrationCommand) -> Result<u64, DriverError>;
}

/// A blocking transaction handle.
pub trait Transaction {
    /// Commit the transaction.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// Release the transaction. An uncommitted transaction is rolled back.
    fn dispose(self);
}

/// An async database connection.
///
/// Operations that accept a [`CancellationToken`] should stop early once it
/// is cancelled and report [`DriverError::Cancelled`].
#[async_trait]
pub trait AsyncConnection: Enlistment + Send {
    /// Transaction handle returned by [`begin_transaction`](Self::begin_transaction).
    type Transaction: AsyncTransaction;

    /// Check if the connection is open.
    fn is_open(&self) -> bool;

    /// Open the connection. Opening an open connection is a no-op.
    async fn open(&mut self, cancel: &CancellationToken) -> Result<(), DriverError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), DriverError>;

    /// Begin a new transaction on this connection.
    async fn begin_transaction(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Self::Transaction, DriverError>;

    /// Execute a command, returning the number of rows affected.
    async fn execute(
        &mut self,
        command: &MigrationCommand,
        cancel: &CancellationToken,
    ) -> Result<u64, DriverError>;
}

/// An async transaction handle.
#[async_trait]
pub trait AsyncTransaction: Send {
    /// Commit the transaction.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Release the transaction. An uncommitted transaction is rolled back.
    async fn dispose(self);
}
