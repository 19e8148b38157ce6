//! Core of unitwork: a generic entity-manipulation pipeline.
//! Validated, transactional writes against a tracking persistence session,
//! with outcomes reported as data.

pub mod db;
pub mod logging;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod session;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::entity::{Entity, EntityState, EntryKey, Identifiable};
pub use outcome::{
    check_all, pattern, rule, ErrorEntry, Outcome, OutcomeError, Validator, ValidatorChain,
    VALIDATION_ERROR_CODE,
};
pub use pipeline::manipulation::{
    Manipulation, ManipulationOptions, ManipulationResult, TrackingOperation,
    CONVERSION_NULL_CODE, NOT_PERSISTED, TRANSACTION_FAILED_CODE,
};
pub use pipeline::service::EntityService;
pub use session::{
    ChangeTracker, InMemorySession, PersistenceSession, SessionError, SessionResult,
    SqliteSession, TrackedEntry, TrackingRequest, TransactionHandle,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
