//! Entity identity and tracking lifecycle.
//!
//! # Responsibility
//! - Define the identity capability every persistable entity exposes.
//! - Define the lifecycle states an entity occupies relative to a session.
//!
//! # Invariants
//! - An entity's identity is stable for its whole lifetime.
//! - `(ENTITY_TYPE, id)` uniquely addresses one tracking record per session.
//!
//! # See also
//! - crate::session::tracker

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// Read-only identity capability.
pub trait Identifiable {
    /// Identity key type; must render to a stable string.
    type Id: Clone + Eq + Hash + Debug + Display;

    fn id(&self) -> &Self::Id;
}

/// Persistable entity handled by sessions and the manipulation pipeline.
///
/// Payloads are stored as JSON documents, so entities must round-trip
/// through `serde`.
pub trait Entity: Identifiable + Serialize + DeserializeOwned {
    /// Stable type discriminator used as the first half of the tracking key.
    const ENTITY_TYPE: &'static str;

    /// Builds the tracking key for this instance.
    fn entry_key(&self) -> EntryKey {
        EntryKey::of::<Self>(self.id())
    }
}

/// Lifecycle state of an entity relative to one persistence session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Not tracked. Initial and terminal state.
    Detached,
    /// Tracked and identical to the backing store.
    Unchanged,
    /// Tracked for insertion on the next save.
    Added,
    /// Tracked for update on the next save.
    Modified,
    /// Tracked for deletion on the next save.
    Deleted,
}

impl EntityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Unchanged => "unchanged",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }

    /// Whether the next save has work to do for an entity in this state.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-wide address of a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub entity_type: &'static str,
    pub entity_id: String,
}

impl EntryKey {
    /// Builds the key for entity type `E` and identity `id`.
    pub fn of<E: Entity>(id: &E::Id) -> Self {
        Self {
            entity_type: E::ENTITY_TYPE,
            entity_id: id.to_string(),
        }
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}
