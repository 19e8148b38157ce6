//! Session-local change tracker.
//!
//! # Responsibility
//! - Hold one tracking record per `(entity_type, entity_id)` key.
//! - Apply request-driven lifecycle transitions.
//! - Hand pending changes to the session's save path and accept them after.
//!
//! # Invariants
//! - A key never maps to more than one record; repeated requests reuse it.
//! - State changes only on explicit requests, `detach`, or `accept_changes`.
//! - `Detached` is never stored; a detached entity has no record.
//! - While a journal is open, `rewind_journal` undoes every `accept_changes`
//!   for records that are still live.

use crate::model::entity::{EntityState, EntryKey};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tracking operation requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingRequest {
    /// Track for insertion.
    Add,
    /// Track as already persisted, no pending change.
    Attach,
    /// Track for update.
    Update,
    /// Track for deletion by identity.
    Remove,
}

impl TrackingRequest {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Attach => "attach",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

/// Returns the state reached from `current` when `request` is applied.
pub fn transition(current: EntityState, request: TrackingRequest) -> EntityState {
    use EntityState::{Added, Deleted, Detached, Modified, Unchanged};

    match (request, current) {
        (TrackingRequest::Add, Detached | Added) => Added,
        (TrackingRequest::Add, Unchanged | Modified | Deleted) => Modified,

        (TrackingRequest::Attach, Detached) => Unchanged,
        (TrackingRequest::Attach, state) => state,

        (TrackingRequest::Update, Added) => Added,
        (TrackingRequest::Update, _) => Modified,

        // Never reached the store, so there is nothing to delete.
        (TrackingRequest::Remove, Added) => Detached,
        (TrackingRequest::Remove, _) => Deleted,
    }
}

/// Handle to a tracking record.
///
/// Two handles with the same `record_id` refer to the same record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    pub key: EntryKey,
    pub record_id: u64,
    pub state: EntityState,
}

/// Change waiting for the next save.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub key: EntryKey,
    pub state: EntityState,
    pub body: Value,
}

#[derive(Debug, Clone)]
struct TrackingRecord {
    record_id: u64,
    state: EntityState,
    snapshot: Value,
}

/// Tracking table owned by one persistence session.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    records: BTreeMap<EntryKey, TrackingRecord>,
    next_record_id: u64,
    journal: Option<Vec<(EntryKey, u64, EntityState)>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `request` to the record for `key`, creating it if needed.
    ///
    /// `attach` keeps the snapshot of an already tracked record so pending
    /// changes are not overwritten by a read.
    pub fn track(&mut self, key: EntryKey, snapshot: Value, request: TrackingRequest) -> TrackedEntry {
        let (record_id, current) = match self.records.get(&key) {
            Some(record) => (record.record_id, record.state),
            None => {
                self.next_record_id += 1;
                (self.next_record_id, EntityState::Detached)
            }
        };

        let next = transition(current, request);
        if next == EntityState::Detached {
            self.records.remove(&key);
            return TrackedEntry {
                key,
                record_id,
                state: next,
            };
        }

        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| TrackingRecord {
                record_id,
                state: next,
                snapshot: Value::Null,
            });
        record.state = next;
        if request != TrackingRequest::Attach || current == EntityState::Detached {
            record.snapshot = snapshot;
        }

        TrackedEntry {
            key,
            record_id,
            state: next,
        }
    }

    /// Looks up the live record for `key`.
    pub fn find(&self, key: &EntryKey) -> Option<TrackedEntry> {
        self.records.get(key).map(|record| TrackedEntry {
            key: key.clone(),
            record_id: record.record_id,
            state: record.state,
        })
    }

    /// Returns the tracked snapshot for `key`, if any.
    pub fn snapshot(&self, key: &EntryKey) -> Option<&Value> {
        self.records.get(key).map(|record| &record.snapshot)
    }

    /// Stops tracking the record behind `entry`.
    ///
    /// Returns `false` when the record is already gone or the handle is
    /// stale (its key now belongs to a newer record).
    pub fn detach(&mut self, entry: &TrackedEntry) -> bool {
        match self.records.get(&entry.key) {
            Some(record) if record.record_id == entry.record_id => {
                self.records.remove(&entry.key);
                true
            }
            _ => false,
        }
    }

    /// Pending changes in key order.
    pub fn pending(&self) -> Vec<PendingChange> {
        self.records
            .iter()
            .filter(|(_, record)| record.state.is_pending())
            .map(|(key, record)| PendingChange {
                key: key.clone(),
                state: record.state,
                body: record.snapshot.clone(),
            })
            .collect()
    }

    /// Marks every pending change as persisted.
    ///
    /// `Added`/`Modified` become `Unchanged`; `Deleted` records are dropped.
    pub fn accept_changes(&mut self) {
        if let Some(journal) = self.journal.as_mut() {
            journal.extend(
                self.records
                    .iter()
                    .filter(|(_, record)| record.state.is_pending())
                    .map(|(key, record)| (key.clone(), record.record_id, record.state)),
            );
        }
        self.records
            .retain(|_, record| record.state != EntityState::Deleted);
        for record in self.records.values_mut() {
            record.state = EntityState::Unchanged;
        }
    }

    /// Starts recording accepted changes, discarding an older journal.
    pub fn open_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    pub fn close_journal(&mut self) {
        self.journal = None;
    }

    /// Puts journaled records back into the pending state they had at
    /// their first acceptance and closes the journal. Returns how many
    /// records were restored.
    ///
    /// Records detached, dropped, replaced or changed again since stay as
    /// they are; snapshots are not touched.
    pub fn rewind_journal(&mut self) -> usize {
        let Some(journal) = self.journal.take() else {
            return 0;
        };
        let mut restored = 0;
        for (key, record_id, state) in journal {
            if let Some(record) = self.records.get_mut(&key) {
                if record.record_id == record_id && record.state == EntityState::Unchanged {
                    record.state = state;
                    restored += 1;
                }
            }
        }
        restored
    }

    pub fn has_changes(&self) -> bool {
        self.records.values().any(|record| record.state.is_pending())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
