//! Session error taxonomy.

use super::transaction::TransactionHandle;
use crate::db::DbError;
use crate::model::entity::EntryKey;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SessionResult<T> = Result<T, SessionError>;

/// Error raised by persistence-session operations.
#[derive(Debug)]
pub enum SessionError {
    /// Entity payload could not be converted to or from JSON.
    Serialization(serde_json::Error),
    /// Backing store failure.
    Db(DbError),
    /// Update or delete targeted a key missing from the store.
    NotFound(EntryKey),
    /// Insert targeted a key already present in the store.
    DuplicateKey(EntryKey),
    /// A transaction is already open on this session.
    TransactionActive(TransactionHandle),
    /// Handle does not match the session's open transaction.
    UnknownTransaction(TransactionHandle),
    /// Persisted data or connection state is unusable.
    InvalidData(String),
}

impl SessionError {
    /// Stable error code reported in `Outcome` entries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "serialization_failed",
            Self::Db(_) => "store_failed",
            Self::NotFound(_) => "not_found",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::TransactionActive(_) | Self::UnknownTransaction(_) => "transaction_failed",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(err) => write!(f, "entity serialization failed: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "entity not found: {key}"),
            Self::DuplicateKey(key) => write!(f, "entity already exists: {key}"),
            Self::TransactionActive(handle) => {
                write!(f, "transaction {handle} is already active on this session")
            }
            Self::UnknownTransaction(handle) => {
                write!(f, "transaction {handle} is not active on this session")
            }
            Self::InvalidData(message) => write!(f, "invalid session data: {message}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
