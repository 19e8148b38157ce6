#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use unitwork_core::{
    ChangeTracker, Entity, Identifiable, InMemorySession, Outcome, PersistenceSession,
    SessionError, SessionResult, TrackedEntry, TransactionHandle,
};
use uuid::Uuid;

/// External representation handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactForm {
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
}

impl ContactForm {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    pub fn with_id(id: Uuid, name: &str, email: &str) -> Self {
        Self {
            id: Some(id),
            ..Self::new(name, email)
        }
    }
}

/// Persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub revision: u32,
}

impl Identifiable for Contact {
    type Id = Uuid;

    fn id(&self) -> &Uuid {
        &self.id
    }
}

impl Entity for Contact {
    const ENTITY_TYPE: &'static str = "contact";
}

/// Converts a form; a missing id becomes the nil id for `stamp_id` to fill.
pub fn to_contact(form: &ContactForm) -> Option<Contact> {
    Some(Contact {
        id: form.id.unwrap_or_else(Uuid::nil),
        name: form.name.clone(),
        email: form.email.clone(),
        revision: 0,
    })
}

pub fn stamp_id(mut contact: Contact) -> Contact {
    if contact.id.is_nil() {
        contact.id = Uuid::new_v4();
    }
    contact.revision += 1;
    contact
}

pub fn copy_id_back(form: &mut ContactForm, contact: &Contact) {
    form.id = Some(contact.id);
}

pub fn require_name(form: &ContactForm) -> Outcome {
    if form.name.trim().is_empty() {
        Outcome::fail("name is required")
            .with_status(422)
            .with_error("name", "name is required")
    } else {
        Outcome::success_empty()
    }
}

pub fn require_email(form: &ContactForm) -> Outcome {
    if form.email.contains('@') {
        Outcome::success_empty()
    } else {
        Outcome::fail("email is invalid")
            .with_status(422)
            .with_error("email", "email must contain @")
    }
}

/// Call counters recorded by `SpySession`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub add: usize,
    pub attach: usize,
    pub update: usize,
    pub remove: usize,
    pub detach: usize,
    pub begin: usize,
    pub commit: usize,
    pub rollback: usize,
    pub save: usize,
    /// Order of transaction/save/detach calls.
    pub sequence: Vec<&'static str>,
}

impl Calls {
    pub fn tracking(&self) -> usize {
        self.add + self.attach + self.update + self.remove
    }
}

/// In-memory session that records every contract call.
#[derive(Debug, Default)]
pub struct SpySession {
    pub inner: InMemorySession,
    pub calls: Calls,
    /// Makes `commit` fail while leaving the transaction open.
    pub fail_commit: bool,
}

impl SpySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }
}

impl PersistenceSession for SpySession {
    fn tracker(&self) -> &ChangeTracker {
        self.inner.tracker()
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        self.inner.tracker_mut()
    }

    fn begin_transaction(&mut self) -> SessionResult<TransactionHandle> {
        self.calls.begin += 1;
        self.calls.sequence.push("begin");
        self.inner.begin_transaction()
    }

    fn commit(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.calls.commit += 1;
        self.calls.sequence.push("commit");
        if self.fail_commit {
            return Err(SessionError::InvalidData("commit refused".to_string()));
        }
        self.inner.commit(handle)
    }

    fn rollback(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.calls.rollback += 1;
        self.calls.sequence.push("rollback");
        self.inner.rollback(handle)
    }

    fn active_transaction(&self) -> Option<TransactionHandle> {
        self.inner.active_transaction()
    }

    fn save(&mut self) -> Outcome<i64> {
        self.calls.save += 1;
        self.calls.sequence.push("save");
        self.inner.save()
    }

    fn fetch<E: Entity>(&mut self, id: &E::Id) -> SessionResult<Option<E>> {
        self.inner.fetch(id)
    }

    fn add<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        self.calls.add += 1;
        self.inner.add(entity)
    }

    fn attach<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        self.calls.attach += 1;
        self.inner.attach(entity)
    }

    fn update<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        self.calls.update += 1;
        self.inner.update(entity)
    }

    fn remove<E: Entity>(&mut self, entity: &E) -> SessionResult<TrackedEntry> {
        self.calls.remove += 1;
        self.inner.remove(entity)
    }

    fn detach(&mut self, entry: &TrackedEntry) {
        self.calls.detach += 1;
        self.calls.sequence.push("detach");
        self.inner.detach(entry);
    }
}
