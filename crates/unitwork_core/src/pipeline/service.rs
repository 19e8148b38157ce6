//! Entity use-case service.
//!
//! # Responsibility
//! - Provide insert/update/delete entry points over one owned session.
//! - Apply service-wide `ManipulationOptions` to every call.
//!
//! # Invariants
//! - Service APIs never bypass the manipulation pipeline for writes.
//! - The service stays storage-agnostic; any `PersistenceSession` works.

use crate::model::entity::Entity;
use crate::outcome::Outcome;
use crate::pipeline::manipulation::{
    Manipulation, ManipulationOptions, ManipulationResult, TrackingOperation,
};
use crate::session::{PersistenceSession, SessionResult};

/// Use-case service wrapping a persistence session.
pub struct EntityService<S: PersistenceSession> {
    session: S,
    options: ManipulationOptions,
}

impl<S: PersistenceSession> EntityService<S> {
    /// Creates a service with default options (persist, transactional).
    pub fn new(session: S) -> Self {
        Self::with_options(session, ManipulationOptions::default())
    }

    pub fn with_options(session: S, options: ManipulationOptions) -> Self {
        Self { session, options }
    }

    pub fn options(&self) -> ManipulationOptions {
        self.options
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Inserts the entity converted from `model`.
    pub fn insert<M, E: Entity>(
        &mut self,
        model: M,
        convert: impl FnOnce(&M) -> Option<E>,
    ) -> Outcome<ManipulationResult<M, E>> {
        self.manipulate(TrackingOperation::Add, model, convert)
    }

    /// Updates the entity converted from `model`.
    pub fn update<M, E: Entity>(
        &mut self,
        model: M,
        convert: impl FnOnce(&M) -> Option<E>,
    ) -> Outcome<ManipulationResult<M, E>> {
        self.manipulate(TrackingOperation::Update, model, convert)
    }

    /// Deletes the entity identified by the conversion of `model`.
    pub fn delete<M, E: Entity>(
        &mut self,
        model: M,
        convert: impl FnOnce(&M) -> Option<E>,
    ) -> Outcome<ManipulationResult<M, E>> {
        self.manipulate(TrackingOperation::Delete, model, convert)
    }

    /// Runs a fully configured manipulation as-is against the session.
    pub fn execute<M, E: Entity>(
        &mut self,
        manipulation: Manipulation<'_, M, E, S>,
    ) -> Outcome<ManipulationResult<M, E>> {
        manipulation.execute(&mut self.session)
    }

    /// Gets one stored entity by id.
    pub fn find<E: Entity>(&mut self, id: &E::Id) -> SessionResult<Option<E>> {
        self.session.fetch(id)
    }

    fn manipulate<M, E: Entity>(
        &mut self,
        operation: TrackingOperation,
        model: M,
        convert: impl FnOnce(&M) -> Option<E>,
    ) -> Outcome<ManipulationResult<M, E>> {
        Manipulation::new(operation, model, convert)
            .options(self.options)
            .execute(&mut self.session)
    }
}
