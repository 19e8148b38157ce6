//! Transaction handles and per-session bookkeeping.
//!
//! # Invariants
//! - A session has at most one open transaction.
//! - Commit/rollback only accept the handle of the open transaction.

use super::error::{SessionError, SessionResult};
use std::fmt::{Display, Formatter};

/// Opaque handle to a session transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionHandle {
    id: u64,
}

impl TransactionHandle {
    pub fn id(self) -> u64 {
        self.id
    }
}

impl Display for TransactionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx#{}", self.id)
    }
}

/// Open-transaction slot embedded in each session implementation.
#[derive(Debug, Default)]
pub struct TransactionSlot {
    active: Option<TransactionHandle>,
    next_id: u64,
}

impl TransactionSlot {
    /// Reserves a new handle; fails if one is already open.
    pub fn open(&mut self) -> SessionResult<TransactionHandle> {
        if let Some(active) = self.active {
            return Err(SessionError::TransactionActive(active));
        }
        self.next_id += 1;
        let handle = TransactionHandle { id: self.next_id };
        self.active = Some(handle);
        Ok(handle)
    }

    /// Verifies that `handle` is the open transaction.
    pub fn check(&self, handle: TransactionHandle) -> SessionResult<()> {
        match self.active {
            Some(active) if active == handle => Ok(()),
            _ => Err(SessionError::UnknownTransaction(handle)),
        }
    }

    /// Releases the open transaction.
    pub fn close(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.check(handle)?;
        self.active = None;
        Ok(())
    }

    pub fn active(&self) -> Option<TransactionHandle> {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::TransactionSlot;
    use crate::session::SessionError;

    #[test]
    fn slot_allows_one_open_transaction() {
        let mut slot = TransactionSlot::default();
        let first = slot.open().expect("first open");
        let err = slot.open().expect_err("second open must fail");
        assert!(matches!(err, SessionError::TransactionActive(handle) if handle == first));

        slot.close(first).expect("close open handle");
        assert!(slot.active().is_none());

        let second = slot.open().expect("reopen after close");
        assert_ne!(first, second);
    }

    #[test]
    fn slot_rejects_stale_handles() {
        let mut slot = TransactionSlot::default();
        let stale = slot.open().expect("open");
        slot.close(stale).expect("close");
        let _current = slot.open().expect("open again");

        let err = slot.close(stale).expect_err("stale handle");
        assert!(matches!(err, SessionError::UnknownTransaction(_)));
    }
}
