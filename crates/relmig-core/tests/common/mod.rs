//! Recording connection used by the executor integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relmig_core::{
    AmbientTransaction, AsyncConnection, AsyncTransaction, CancellationToken, Connection,
    DriverError, Enlistment, MigrationCommand, Transaction,
};
use thiserror::Error;

/// Error raised by the fake driver.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("fake driver: {0}")]
pub struct FakeError(pub &'static str);

/// Everything the connection was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Close,
    Begin { id: u32, enlisted: bool },
    Execute { text: String, transaction: Option<u32> },
    Commit(u32),
    Dispose { id: u32, committed: bool },
}

/// Failures injected into the fake connection.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_open: bool,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_close: bool,
    /// Command text that fails when executed.
    pub fail_command: Option<String>,
    /// Command text that reports `DriverError::Cancelled`.
    pub cancelled_command: Option<String>,
    /// Command text that fires the token while executing, then succeeds.
    pub cancel_on_command: Option<(String, CancellationToken)>,
    /// Command text that never completes on its own.
    pub hang_on_command: Option<String>,
}

#[derive(Debug, Default)]
struct Session {
    events: Vec<Event>,
    durable: Vec<String>,
    staged: Vec<String>,
    active: Option<u32>,
    next_transaction: u32,
}

/// In-memory connection that records every operation.
///
/// Commands executed inside a transaction only become durable on commit.
pub struct FakeConnection {
    session: Arc<Mutex<Session>>,
    open: bool,
    ambient: Option<AmbientTransaction>,
    pub faults: Faults,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::default())),
            open: false,
            ambient: None,
            faults: Faults::default(),
        }
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::new()
        }
    }

    pub fn enlist(&mut self, ambient: AmbientTransaction) {
        self.ambient = Some(ambient);
    }

    pub fn ambient(&self) -> Option<&AmbientTransaction> {
        self.ambient.as_ref()
    }

    pub fn opened(&self) -> bool {
        self.open
    }

    pub fn events(&self) -> Vec<Event> {
        self.session.lock().events.clone()
    }

    /// Commands whose effects were made durable.
    pub fn durable(&self) -> Vec<String> {
        self.session.lock().durable.clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.session.lock().events.iter().filter(|e| pred(e)).count()
    }

    fn do_open(&mut self) -> Result<(), DriverError> {
        if self.faults.fail_open {
            return Err(DriverError::driver(FakeError("open refused")));
        }
        if !self.open {
            self.open = true;
            self.session.lock().events.push(Event::Open);
        }
        Ok(())
    }

    fn do_close(&mut self) -> Result<(), DriverError> {
        self.open = false;
        self.session.lock().events.push(Event::Close);
        if self.faults.fail_close {
            return Err(DriverError::driver(FakeError("close failed")));
        }
        Ok(())
    }

    fn do_begin(&mut self) -> Result<FakeTransaction, DriverError> {
        if !self.open {
            return Err(DriverError::NotOpen);
        }
        if self.faults.fail_begin {
            return Err(DriverError::driver(FakeError("begin refused")));
        }

        let mut session = self.session.lock();
        session.next_transaction += 1;
        let id = session.next_transaction;
        session.active = Some(id);
        session.events.push(Event::Begin {
            id,
            enlisted: self.ambient.is_some(),
        });

        Ok(FakeTransaction {
            id,
            session: Arc::clone(&self.session),
            committed: false,
            fail_commit: self.faults.fail_commit,
        })
    }

    fn do_execute(&mut self, command: &MigrationCommand) -> Result<u64, DriverError> {
        if !self.open {
            return Err(DriverError::NotOpen);
        }

        let text = command.command_text().to_string();
        let mut session = self.session.lock();
        let transaction = session.active;
        session.events.push(Event::Execute {
            text: text.clone(),
            transaction,
        });

        if self.faults.fail_command.as_deref() == Some(text.as_str()) {
            return Err(DriverError::driver(FakeError("command failed")));
        }
        if self.faults.cancelled_command.as_deref() == Some(text.as_str()) {
            return Err(DriverError::Cancelled);
        }

        if transaction.is_some() {
            session.staged.push(text);
        } else {
            session.durable.push(text);
        }
        Ok(1)
    }
}

impl Enlistment for FakeConnection {
    fn detach_ambient(&mut self) -> Option<AmbientTransaction> {
        self.ambient.take()
    }

    fn reattach_ambient(&mut self, ambient: AmbientTransaction) {
        self.ambient = Some(ambient);
    }
}

impl Connection for FakeConnection {
    type Transaction = FakeTransaction;

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), DriverError> {
        self.do_open()
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.do_close()
    }

    fn begin_transaction(&mut self) -> Result<FakeTransaction, DriverError> {
        self.do_begin()
    }

    fn execute(&mut self, command: &MigrationCommand) -> Result<u64, DriverError> {
        self.do_execute(command)
    }
}

#[async_trait]
impl AsyncConnection for FakeConnection {
    type Transaction = FakeTransaction;

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self, _cancel: &CancellationToken) -> Result<(), DriverError> {
        tokio::task::yield_now().await;
        self.do_open()
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.do_close()
    }

    async fn begin_transaction(
        &mut self,
        _cancel: &CancellationToken,
    ) -> Result<FakeTransaction, DriverError> {
        tokio::task::yield_now().await;
        self.do_begin()
    }

    async fn execute(
        &mut self,
        command: &MigrationCommand,
        _cancel: &CancellationToken,
    ) -> Result<u64, DriverError> {
        tokio::task::yield_now().await;

        if self.faults.hang_on_command.as_deref() == Some(command.command_text()) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let rows = self.do_execute(command)?;

        if let Some((text, token)) = &self.faults.cancel_on_command {
            if text == command.command_text() {
                token.cancel();
            }
        }
        Ok(rows)
    }
}

/// Transaction handle of [`FakeConnection`].
pub struct FakeTransaction {
    id: u32,
    session: Arc<Mutex<Session>>,
    committed: bool,
    fail_commit: bool,
}

impl FakeTransaction {
    fn do_commit(&mut self) -> Result<(), DriverError> {
        if self.fail_commit {
            return Err(DriverError::driver(FakeError("commit failed")));
        }

        let mut session = self.session.lock();
        let staged = std::mem::take(&mut session.staged);
        session.durable.extend(staged);
        session.events.push(Event::Commit(self.id));
        self.committed = true;
        Ok(())
    }

    fn do_dispose(self) {
        let mut session = self.session.lock();
        if !self.committed {
            session.staged.clear();
        }
        session.active = None;
        session.events.push(Event::Dispose {
            id: self.id,
            committed: self.committed,
        });
    }
}

impl Transaction for FakeTransaction {
    fn commit(&mut self) -> Result<(), DriverError> {
        self.do_commit()
    }

    fn dispose(self) {
        self.do_dispose()
    }
}

#[async_trait]
impl AsyncTransaction for FakeTransaction {
    async fn commit(&mut self) -> Result<(), DriverError> {
        self.do_commit()
    }

    async fn dispose(self) {
        self.do_dispose()
    }
}

pub fn exec(text: &str, transaction: Option<u32>) -> Event {
    Event::Execute {
        text: text.to_string(),
        transaction,
    }
}

pub fn begin(id: u32) -> Event {
    Event::Begin {
        id,
        enlisted: false,
    }
}

pub fn released(id: u32) -> Event {
    Event::Dispose {
        id,
        committed: true,
    }
}

pub fn rolled_back(id: u32) -> Event {
    Event::Dispose {
        id,
        committed: false,
    }
}
