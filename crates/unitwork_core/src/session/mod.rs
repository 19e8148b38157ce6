//! Persistence sessions.
//!
//! # Responsibility
//! - Define the minimal session contract consumed by the pipeline.
//! - Provide in-memory and SQLite-backed implementations.
//!
//! # Invariants
//! - Tracking operations touch only session-local state; the backing store
//!   changes on `save` only.
//! - `save` reports store failures as a failed `Outcome`, never as a panic.
//! - `detach` is idempotent.
//!
//! # See also
//! - crate::pipeline::manipulation

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod tracker;
pub mod transaction;

use crate::model::entity::{Entity, EntryKey};
use crate::outcome::Outcome;
use log::debug;

pub use error::{SessionError, SessionResult};
pub use memory::InMemorySession;
pub use sqlite::SqliteSession;
pub use tracker::{ChangeTracker, PendingChange, TrackedEntry, TrackingRequest};
pub use transaction::TransactionHandle;

/// Stateful unit of work over a transactional backing store.
///
/// Implementors supply the tracker, transactions, `save` and `fetch`; the
/// tracking operations are provided on top of the tracker.
pub trait PersistenceSession {
    fn tracker(&self) -> &ChangeTracker;

    fn tracker_mut(&mut self) -> &mut ChangeTracker;

    /// Opens a transaction on the backing store.
    fn begin_transaction(&mut self) -> SessionResult<TransactionHandle>;

    fn commit(&mut self, handle: TransactionHandle) -> SessionResult<()>;

    fn rollback(&mut self, handle: TransactionHandle) -> SessionResult<()>;

    /// Handle of the open transaction, if any.
    fn active_transaction(&self) -> Option<TransactionHandle>;

    /// Writes pending changes and returns the affected count.
    fn save(&mut self) -> Outcome<i64>;

    /// Reads one entity from the backing store without tracking it.
    fn fetch<E: Entity>(&mut self, id: &E::Id) -> SessionResult<Option<E>>;

    /// Tracks `entity` for insertion.
    fn add<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        track(self, entity, TrackingRequest::Add)
    }

    /// Tracks `entity` as persisted and unchanged.
    fn attach<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        track(self, entity, TrackingRequest::Attach)
    }

    /// Tracks `entity` for update.
    fn update<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        track(self, entity, TrackingRequest::Update)
    }

    /// Tracks `entity` for deletion by identity.
    fn remove<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        track(self, entity, TrackingRequest::Remove)
    }

    fn find_tracked<E: Entity>(&self, id: &E::Id) -> Option<TrackedEntry> {
        self.tracker().find(&EntryKey::of::<E>(id))
    }

    /// Stops tracking `entry`. A no-op when it is not tracked.
    fn detach(&mut self, entry: &TrackedEntry) {
        let removed = self.tracker_mut().detach(entry);
        debug!(
            "event=entity_detach module=session status=ok key={} removed={}",
            entry.key, removed
        );
    }

    /// Reads one entity from the store and tracks it as unchanged.
    fn fetch_attached<E: Entity>(&mut self, id: &E::Id) -> SessionResult<Option<E>> {
        let Some(entity) = self.fetch::<E>(id)? else {
            return Ok(None);
        };
        self.attach(&entity)?;
        Ok(Some(entity))
    }

    fn tracked_count(&self) -> usize {
        self.tracker().len()
    }

    fn has_changes(&self) -> bool {
        self.tracker().has_changes()
    }
}

fn track<S, E>(session: &mut S, entity: &E, request: TrackingRequest) -> SessionResult<TrackedEntry>
where
    S: PersistenceSession + ?Sized,
    E: Entity,
{
    let snapshot = serde_json::to_value(entity)?;
    let entry = session
        .tracker_mut()
        .track(entity.entry_key(), snapshot, request);
    debug!(
        "event=entity_track module=session status=ok request={} key={} state={}",
        request.as_str(),
        entry.key,
        entry.state
    );
    Ok(entry)
}
