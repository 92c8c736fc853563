//! Ambient transaction context and its suppression scope.
//!
//! A connection may be enlisted in an [`AmbientTransaction`] established by
//! calling code. While enlisted, transactions the connection begins would be
//! absorbed into that outer unit of work. The executor detaches the ambient
//! transaction for the duration of a call with a [`SuppressionScope`] and
//! reattaches it afterwards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_AMBIENT_ID: AtomicU64 = AtomicU64::new(1);

/// A caller-established transactional context that connections can enlist in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientTransaction {
    id: u64,
    label: String,
}

impl AmbientTransaction {
    /// Create a new ambient transaction with a unique id.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: NEXT_AMBIENT_ID.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
        }
    }

    /// Unique id of this context.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for AmbientTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, self.id)
    }
}

/// Enlistment of a connection in an ambient transaction.
///
/// Connections that never enlist can rely on the default methods.
pub trait Enlistment {
    /// Detach and return the ambient transaction this connection is enlisted in.
    fn detach_ambient(&mut self) -> Option<AmbientTransaction> {
        None
    }

    /// Re-enlist the connection in a previously detached ambient transaction.
    fn reattach_ambient(&mut self, ambient: AmbientTransaction) {
        let _ = ambient;
    }
}

/// Scope that keeps a connection out of any ambient transaction.
///
/// The scope borrows the connection for its whole lifetime and hands it to
/// inner levels through [`connection`](Self::connection). It is a plain value,
/// so it stays live across `.await` points. Release is idempotent and also
/// happens on drop.
pub struct SuppressionScope<'c, C: Enlistment + ?Sized> {
    connection: &'c mut C,
    suppressed: Option<AmbientTransaction>,
    released: bool,
}

impl<'c, C: Enlistment + ?Sized> SuppressionScope<'c, C> {
    /// Enter the scope, detaching any ambient transaction from `connection`.
    pub fn enter(connection: &'c mut C) -> Self {
        let suppressed = connection.detach_ambient();
        if let Some(ambient) = &suppressed {
            tracing::debug!(ambient = %ambient, "Suppressing ambient transaction");
        }

        Self {
            connection,
            suppressed,
            released: false,
        }
    }

    /// The connection guarded by this scope.
    pub fn connection(&mut self) -> &mut C {
        &mut *self.connection
    }

    /// The ambient transaction held aside while the scope is live.
    pub fn suppressed(&self) -> Option<&AmbientTransaction> {
        self.suppressed.as_ref()
    }

    /// Check if the scope has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the scope, reattaching the ambient transaction if there was one.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(ambient) = self.suppressed.take() {
            tracing::debug!(ambient = %ambient, "Restoring ambient transaction");
            self.connection.reattach_ambient(ambient);
        }
    }
}

impl<C: Enlistment + ?Sized> Drop for SuppressionScope<'_, C> {
    fn drop(&mut self) {
        self.release();
    }
}
