//! In-memory persistence session.
//!
//! # Responsibility
//! - Keep committed entity documents in process memory.
//! - Emulate transactions with a store snapshot restored on rollback.
//!
//! # Invariants
//! - `save` applies all pending changes or none of them.
//! - The tracker changes only after the store accepted every change.
//! - Rollback returns changes accepted inside the transaction to pending.

use super::error::{SessionError, SessionResult};
use super::tracker::{ChangeTracker, PendingChange};
use super::transaction::{TransactionHandle, TransactionSlot};
use super::PersistenceSession;
use crate::model::entity::{Entity, EntityState, EntryKey};
use crate::outcome::Outcome;
use log::{error, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

type Documents = BTreeMap<EntryKey, Value>;

/// Persistence session backed by an in-process document map.
#[derive(Debug)]
pub struct InMemorySession {
    session_id: Uuid,
    tracker: ChangeTracker,
    documents: Documents,
    transaction: TransactionSlot,
    rollback_image: Option<Documents>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            tracker: ChangeTracker::new(),
            documents: Documents::new(),
            transaction: TransactionSlot::default(),
            rollback_image: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Number of committed documents in the store.
    pub fn stored_count(&self) -> usize {
        self.documents.len()
    }

    fn apply(&mut self, pending: &[PendingChange]) -> SessionResult<i64> {
        for change in pending {
            let exists = self.documents.contains_key(&change.key);
            match change.state {
                EntityState::Added if exists => {
                    return Err(SessionError::DuplicateKey(change.key.clone()));
                }
                EntityState::Modified | EntityState::Deleted if !exists => {
                    return Err(SessionError::NotFound(change.key.clone()));
                }
                _ => {}
            }
        }

        let mut affected = 0;
        for change in pending {
            match change.state {
                EntityState::Added | EntityState::Modified => {
                    self.documents.insert(change.key.clone(), change.body.clone());
                }
                EntityState::Deleted => {
                    self.documents.remove(&change.key);
                }
                EntityState::Unchanged | EntityState::Detached => continue,
            }
            affected += 1;
        }
        Ok(affected)
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceSession for InMemorySession {
    fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    fn begin_transaction(&mut self) -> SessionResult<TransactionHandle> {
        let handle = self.transaction.open()?;
        self.rollback_image = Some(self.documents.clone());
        self.tracker.open_journal();
        info!(
            "event=tx_begin module=session status=ok store=memory session_id={} tx={}",
            self.session_id, handle
        );
        Ok(handle)
    }

    fn commit(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.transaction.close(handle)?;
        self.rollback_image = None;
        self.tracker.close_journal();
        info!(
            "event=tx_commit module=session status=ok store=memory session_id={} tx={}",
            self.session_id, handle
        );
        Ok(())
    }

    fn rollback(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.transaction.close(handle)?;
        if let Some(image) = self.rollback_image.take() {
            self.documents = image;
        }
        let restored = self.tracker.rewind_journal();
        info!(
            "event=tx_rollback module=session status=ok store=memory session_id={} tx={} restored={}",
            self.session_id, handle, restored
        );
        Ok(())
    }

    fn active_transaction(&self) -> Option<TransactionHandle> {
        self.transaction.active()
    }

    fn save(&mut self) -> Outcome<i64> {
        let started_at = Instant::now();
        let pending = self.tracker.pending();

        match self.apply(&pending) {
            Ok(affected) => {
                self.tracker.accept_changes();
                info!(
                    "event=session_save module=session status=ok store=memory session_id={} affected={} duration_ms={}",
                    self.session_id,
                    affected,
                    started_at.elapsed().as_millis()
                );
                Outcome::success(affected)
            }
            Err(err) => {
                error!(
                    "event=session_save module=session status=error store=memory session_id={} duration_ms={} error_code={} error={}",
                    self.session_id,
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                Outcome::from_error(err.code(), &err)
            }
        }
    }

    fn fetch<E: Entity>(&mut self, id: &E::Id) -> SessionResult<Option<E>> {
        match self.documents.get(&EntryKey::of::<E>(id)) {
            Some(body) => Ok(Some(serde_json::from_value(body.clone())?)),
            None => Ok(None),
        }
    }
}
