//! Entity manipulation pipeline.
//!
//! # Responsibility
//! - Orchestrate validate → convert → transform → track → commit → save.
//! - Report every data-level failure as an `Outcome`, never as a panic.
//! - Detach the manipulated entity after every persisted call.
//!
//! # Invariants
//! - Validation and conversion failures return before any session call.
//! - A pipeline-owned transaction is committed before save, or rolled back
//!   when the call exits early.
//! - A caller-supplied transaction must be the session's open one.
//! - Detach runs after save resolves, on success, failure and unwinding.
//! - Non-persisted calls report `affected == NOT_PERSISTED` and leave the
//!   entity tracked.

use crate::model::entity::{Entity, EntryKey};
use crate::outcome::{Outcome, Validator};
use crate::session::{
    PersistenceSession, SessionError, SessionResult, TrackedEntry, TransactionHandle,
};
use log::{debug, error, info, warn};
use std::time::Instant;

/// Affected count reported when the pipeline did not persist.
pub const NOT_PERSISTED: i64 = -1;

/// Error code for a convert function that produced no entity.
pub const CONVERSION_NULL_CODE: &str = "conversion_null";
/// Error code for transaction begin/commit failures.
pub const TRANSACTION_FAILED_CODE: &str = "transaction_failed";

/// Tracking operation requested for the converted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingOperation {
    /// Insert a new entity.
    Add,
    /// Attach for update.
    Update,
    /// Attach for delete by identity.
    Delete,
}

impl TrackingOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn apply<S, E>(self, session: &mut S, entity: &E) -> SessionResult<TrackedEntry>
    where
        S: PersistenceSession,
        E: Entity,
    {
        match self {
            Self::Add => session.add(entity),
            Self::Update => session.update(entity),
            Self::Delete => session.remove(entity),
        }
    }
}

/// Persistence switches applied to a manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManipulationOptions {
    /// Save after tracking. When `false` no transaction is opened either.
    pub persist: bool,
    /// Wrap the call in a transaction when persisting.
    pub use_transaction: bool,
}

impl Default for ManipulationOptions {
    fn default() -> Self {
        Self {
            persist: true,
            use_transaction: true,
        }
    }
}

/// `(model, entity)` pair produced by one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulationResult<M, E> {
    /// The caller's model, including changes made by `on_committed`.
    pub model: M,
    /// The converted entity; `None` when the call stopped before conversion
    /// produced one.
    pub entity: Option<E>,
    /// Save's affected count, `NOT_PERSISTED` when not saved, `0` when the
    /// call failed before save.
    pub affected: i64,
}

impl<M, E> ManipulationResult<M, E> {
    fn rejected(model: M) -> Self {
        Self {
            model,
            entity: None,
            affected: 0,
        }
    }
}

type Convert<'a, M, E> = Box<dyn FnOnce(&M) -> Option<E> + 'a>;
type OnCommitting<'a, E> = Box<dyn FnOnce(E) -> E + 'a>;
type OnCommitted<'a, M, E> = Box<dyn FnOnce(&mut M, &E) + 'a>;
type SaveOverride<'a, S> = Box<dyn FnOnce(&mut S) -> Outcome<i64> + 'a>;

/// One configured pipeline invocation.
///
/// The model and convert function are required at construction; everything
/// else is optional.
pub struct Manipulation<'a, M, E, S> {
    operation: TrackingOperation,
    model: M,
    convert: Convert<'a, M, E>,
    validator: Option<Box<dyn Validator<M> + 'a>>,
    on_committing: Option<OnCommitting<'a, E>>,
    on_committed: Option<OnCommitted<'a, M, E>>,
    options: ManipulationOptions,
    transaction: Option<TransactionHandle>,
    save: Option<SaveOverride<'a, S>>,
}

impl<'a, M, E, S> Manipulation<'a, M, E, S>
where
    E: Entity,
    S: PersistenceSession,
{
    pub fn new(
        operation: TrackingOperation,
        model: M,
        convert: impl FnOnce(&M) -> Option<E> + 'a,
    ) -> Self {
        Self {
            operation,
            model,
            convert: Box::new(convert),
            validator: None,
            on_committing: None,
            on_committed: None,
            options: ManipulationOptions::default(),
            transaction: None,
            save: None,
        }
    }

    pub fn insert(model: M, convert: impl FnOnce(&M) -> Option<E> + 'a) -> Self {
        Self::new(TrackingOperation::Add, model, convert)
    }

    pub fn update(model: M, convert: impl FnOnce(&M) -> Option<E> + 'a) -> Self {
        Self::new(TrackingOperation::Update, model, convert)
    }

    pub fn delete(model: M, convert: impl FnOnce(&M) -> Option<E> + 'a) -> Self {
        Self::new(TrackingOperation::Delete, model, convert)
    }

    /// Validator run before conversion; a failure ends the call.
    pub fn validator(mut self, validator: impl Validator<M> + 'a) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Transform applied to the entity right before tracking.
    pub fn on_committing(mut self, hook: impl FnOnce(E) -> E + 'a) -> Self {
        self.on_committing = Some(Box::new(hook));
        self
    }

    /// Callback run after a successful save, before detach.
    pub fn on_committed(mut self, hook: impl FnOnce(&mut M, &E) + 'a) -> Self {
        self.on_committed = Some(Box::new(hook));
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.options.persist = persist;
        self
    }

    pub fn use_transaction(mut self, use_transaction: bool) -> Self {
        self.options.use_transaction = use_transaction;
        self
    }

    pub fn options(mut self, options: ManipulationOptions) -> Self {
        self.options = options;
        self
    }

    /// Reuses a caller-owned transaction instead of opening one.
    ///
    /// The pipeline never commits or rolls back a caller-owned transaction.
    /// A persisted call fails with `TRANSACTION_FAILED_CODE` unless `handle`
    /// is the session's open transaction.
    pub fn transaction(mut self, handle: TransactionHandle) -> Self {
        self.transaction = Some(handle);
        self
    }

    /// Replaces the session's default `save`.
    pub fn save_with(mut self, save: impl FnOnce(&mut S) -> Outcome<i64> + 'a) -> Self {
        self.save = Some(Box::new(save));
        self
    }

    /// Runs the pipeline against `session`.
    pub fn execute(self, session: &mut S) -> Outcome<ManipulationResult<M, E>> {
        let started_at = Instant::now();
        let Manipulation {
            operation,
            mut model,
            convert,
            validator,
            on_committing,
            on_committed,
            options,
            transaction,
            save,
        } = self;
        let op = operation.as_str();
        let entity_type = E::ENTITY_TYPE;

        debug!(
            "event=manipulate module=pipeline status=start op={} entity_type={} persist={} use_transaction={}",
            op, entity_type, options.persist, options.use_transaction
        );

        let mut scope = SessionScope::new(session);

        let began = match transaction {
            Some(handle) if options.persist => scope.join(handle),
            Some(_) => Ok(()),
            None if options.persist && options.use_transaction => scope.begin_owned(),
            None => Ok(()),
        };
        if let Err(err) = began {
            error!(
                "event=manipulate module=pipeline status=error op={} entity_type={} error_code={} error={}",
                op, entity_type, TRANSACTION_FAILED_CODE, err
            );
            return Outcome::<()>::from_error(TRANSACTION_FAILED_CODE, &err)
                .rewrap(ManipulationResult::rejected(model));
        }

        if let Some(validator) = validator {
            let verdict = validator.validate(&model);
            if !verdict.succeeded() {
                warn!(
                    "event=manipulate module=pipeline status=rejected op={} entity_type={} reason=validation errors={}",
                    op,
                    entity_type,
                    verdict.errors().len()
                );
                return verdict.rewrap(ManipulationResult::rejected(model));
            }
        }

        let Some(entity) = convert(&model) else {
            warn!(
                "event=manipulate module=pipeline status=rejected op={} entity_type={} reason=conversion_null",
                op, entity_type
            );
            let message = format!("{entity_type} cannot be null");
            return Outcome::<()>::fail(message.clone())
                .with_error(CONVERSION_NULL_CODE, message)
                .rewrap(ManipulationResult::rejected(model));
        };

        let entity = match on_committing {
            Some(hook) => hook(entity),
            None => entity,
        };

        let entry = match operation.apply(scope.session(), &entity) {
            Ok(entry) => entry,
            Err(err) => {
                error!(
                    "event=manipulate module=pipeline status=error op={} entity_type={} error_code={} error={}",
                    op,
                    entity_type,
                    err.code(),
                    err
                );
                return Outcome::<()>::from_error(err.code(), &err).rewrap(ManipulationResult {
                    model,
                    entity: Some(entity),
                    affected: 0,
                });
            }
        };

        if !options.persist {
            info!(
                "event=manipulate module=pipeline status=ok op={} entity_type={} key={} persisted=false duration_ms={}",
                op,
                entity_type,
                entry.key,
                started_at.elapsed().as_millis()
            );
            return Outcome::success(ManipulationResult {
                model,
                entity: Some(entity),
                affected: NOT_PERSISTED,
            });
        }

        scope.guard(entry);

        if let Err(err) = scope.commit_owned() {
            error!(
                "event=manipulate module=pipeline status=error op={} entity_type={} error_code={} error={}",
                op, entity_type, TRANSACTION_FAILED_CODE, err
            );
            return Outcome::<()>::from_error(TRANSACTION_FAILED_CODE, &err).rewrap(
                ManipulationResult {
                    model,
                    entity: Some(entity),
                    affected: 0,
                },
            );
        }

        let saved = match save {
            Some(save) => save(scope.session()),
            None => scope.session().save(),
        };

        if saved.succeeded() {
            if let Some(hook) = on_committed {
                hook(&mut model, &entity);
            }
        }

        let key = scope.finish();
        let affected = saved.value().copied().unwrap_or(0);

        if saved.succeeded() {
            info!(
                "event=manipulate module=pipeline status=ok op={} entity_type={} key={} affected={} duration_ms={}",
                op,
                entity_type,
                key.map(|key| key.to_string()).unwrap_or_default(),
                affected,
                started_at.elapsed().as_millis()
            );
        } else {
            error!(
                "event=manipulate module=pipeline status=error op={} entity_type={} error_code=save_failed errors={} duration_ms={}",
                op,
                entity_type,
                saved.errors().len(),
                started_at.elapsed().as_millis()
            );
        }

        saved.rewrap(ManipulationResult {
            model,
            entity: Some(entity),
            affected,
        })
    }
}

/// Scope-exit cleanup for one pipeline call.
///
/// On drop: detaches the guarded entry, then rolls back a transaction the
/// pipeline opened but did not commit.
struct SessionScope<'s, S: PersistenceSession> {
    session: &'s mut S,
    owned_transaction: Option<TransactionHandle>,
    entry: Option<TrackedEntry>,
}

impl<'s, S: PersistenceSession> SessionScope<'s, S> {
    fn new(session: &'s mut S) -> Self {
        Self {
            session,
            owned_transaction: None,
            entry: None,
        }
    }

    fn session(&mut self) -> &mut S {
        self.session
    }

    /// Accepts `handle` only while it is the session's open transaction.
    fn join(&self, handle: TransactionHandle) -> SessionResult<()> {
        match self.session.active_transaction() {
            Some(active) if active == handle => Ok(()),
            _ => Err(SessionError::UnknownTransaction(handle)),
        }
    }

    fn begin_owned(&mut self) -> SessionResult<()> {
        self.owned_transaction = Some(self.session.begin_transaction()?);
        Ok(())
    }

    fn commit_owned(&mut self) -> SessionResult<()> {
        if let Some(handle) = self.owned_transaction {
            self.session.commit(handle)?;
            self.owned_transaction = None;
        }
        Ok(())
    }

    fn guard(&mut self, entry: TrackedEntry) {
        self.entry = Some(entry);
    }

    /// Runs cleanup now and returns the key of the detached entry.
    fn finish(mut self) -> Option<EntryKey> {
        let key = self.entry.as_ref().map(|entry| entry.key.clone());
        self.cleanup();
        key
    }

    fn cleanup(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.session.detach(&entry);
        }
        if let Some(handle) = self.owned_transaction.take() {
            match self.session.rollback(handle) {
                Ok(()) => debug!(
                    "event=manipulate module=pipeline status=rollback tx={}",
                    handle
                ),
                Err(err) => warn!(
                    "event=manipulate module=pipeline status=error tx={} error_code=rollback_failed error={}",
                    handle, err
                ),
            }
        }
    }
}

impl<S: PersistenceSession> Drop for SessionScope<'_, S> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
