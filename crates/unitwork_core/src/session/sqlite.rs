//! SQLite-backed persistence session.
//!
//! # Responsibility
//! - Store entity documents as JSON rows in the `entities` table.
//! - Map session transactions onto SQLite `BEGIN`/`COMMIT`/`ROLLBACK`.
//!
//! # Invariants
//! - `save` writes inside a savepoint, so a failed save leaves no partial
//!   rows behind, with or without an open session transaction.
//! - Insert of an existing key, update or delete of a missing key fail the
//!   whole save.

use super::error::{SessionError, SessionResult};
use super::tracker::{ChangeTracker, PendingChange};
use super::transaction::{TransactionHandle, TransactionSlot};
use super::PersistenceSession;
use crate::db::migrations::ensure_schema_ready;
use crate::db::{open_db, open_db_in_memory};
use crate::model::entity::{Entity, EntityState, EntryKey};
use crate::outcome::Outcome;
use log::{error, info};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// Persistence session over a migrated SQLite connection.
pub struct SqliteSession {
    session_id: Uuid,
    conn: Connection,
    tracker: ChangeTracker,
    transaction: TransactionSlot,
}

impl SqliteSession {
    /// Wraps a connection that already has the latest schema applied.
    pub fn new(conn: Connection) -> SessionResult<Self> {
        ensure_schema_ready(&conn)?;
        Ok(Self {
            session_id: Uuid::new_v4(),
            conn,
            tracker: ChangeTracker::new(),
            transaction: TransactionSlot::default(),
        })
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        Self::new(open_db(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> SessionResult<Self> {
        Self::new(open_db_in_memory()?)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Read access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of stored rows for entity type `E`.
    pub fn count<E: Entity>(&self) -> SessionResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE entity_type = ?1;",
            [E::ENTITY_TYPE],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    /// Loads every stored entity of type `E`, most recently updated first.
    pub fn list<E: Entity>(&self) -> SessionResult<Vec<E>> {
        let mut stmt = self.conn.prepare(
            "SELECT body
             FROM entities
             WHERE entity_type = ?1
             ORDER BY updated_at DESC, entity_id ASC;",
        )?;
        let mut rows = stmt.query([E::ENTITY_TYPE])?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            entities.push(serde_json::from_str(&body)?);
        }

        Ok(entities)
    }

    fn apply(&mut self, pending: &[PendingChange]) -> SessionResult<i64> {
        let savepoint = self.conn.savepoint()?;
        let mut affected = 0_i64;

        for change in pending {
            let changed = match change.state {
                EntityState::Added => insert_row(&savepoint, change)?,
                EntityState::Modified => {
                    let body = serde_json::to_string(&change.body)?;
                    savepoint.execute(
                        "UPDATE entities
                         SET
                            body = ?3,
                            updated_at = (strftime('%s', 'now') * 1000)
                         WHERE entity_type = ?1
                           AND entity_id = ?2;",
                        params![change.key.entity_type, change.key.entity_id, body],
                    )?
                }
                EntityState::Deleted => savepoint.execute(
                    "DELETE FROM entities
                     WHERE entity_type = ?1
                       AND entity_id = ?2;",
                    params![change.key.entity_type, change.key.entity_id],
                )?,
                EntityState::Unchanged | EntityState::Detached => continue,
            };

            if changed == 0 {
                return Err(SessionError::NotFound(change.key.clone()));
            }
            affected += changed as i64;
        }

        savepoint.commit()?;
        Ok(affected)
    }
}

fn insert_row(conn: &Connection, change: &PendingChange) -> SessionResult<usize> {
    let body = serde_json::to_string(&change.body)?;
    conn.execute(
        "INSERT INTO entities (entity_type, entity_id, body) VALUES (?1, ?2, ?3);",
        params![change.key.entity_type, change.key.entity_id, body],
    )
    .map_err(|err| match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => SessionError::DuplicateKey(change.key.clone()),
        _ => err.into(),
    })
}

impl PersistenceSession for SqliteSession {
    fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    fn begin_transaction(&mut self) -> SessionResult<TransactionHandle> {
        let handle = self.transaction.open()?;
        if let Err(err) = self.conn.execute_batch("BEGIN IMMEDIATE;") {
            self.transaction.close(handle)?;
            return Err(err.into());
        }
        self.tracker.open_journal();
        info!(
            "event=tx_begin module=session status=ok store=sqlite session_id={} tx={}",
            self.session_id, handle
        );
        Ok(handle)
    }

    fn commit(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.transaction.check(handle)?;
        self.conn.execute_batch("COMMIT;")?;
        self.transaction.close(handle)?;
        self.tracker.close_journal();
        info!(
            "event=tx_commit module=session status=ok store=sqlite session_id={} tx={}",
            self.session_id, handle
        );
        Ok(())
    }

    fn rollback(&mut self, handle: TransactionHandle) -> SessionResult<()> {
        self.transaction.check(handle)?;
        self.conn.execute_batch("ROLLBACK;")?;
        self.transaction.close(handle)?;
        let restored = self.tracker.rewind_journal();
        info!(
            "event=tx_rollback module=session status=ok store=sqlite session_id={} tx={} restored={}",
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
                    "event=session_save module=session status=ok store=sqlite session_id={} changes={} affected={} duration_ms={}",
                    self.session_id,
                    pending.len(),
                    affected,
                    started_at.elapsed().as_millis()
                );
                Outcome::success(affected)
            }
            Err(err) => {
                error!(
                    "event=session_save module=session status=error store=sqlite session_id={} duration_ms={} error_code={} error={}",
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
        let key = EntryKey::of::<E>(id);
        let body = self
            .conn
            .query_row(
                "SELECT body
                 FROM entities
                 WHERE entity_type = ?1
                   AND entity_id = ?2;",
                params![key.entity_type, key.entity_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }
}
