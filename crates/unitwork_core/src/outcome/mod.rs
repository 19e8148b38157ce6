//! Outcome reporting and validation.
//!
//! # Responsibility
//! - Represent operation results as data instead of control flow.
//! - Combine validator outcomes so callers see every problem at once.
//!
//! # Invariants
//! - Only programmer-contract violations may bypass `Outcome`; data errors
//!   are always reported through it.

pub mod result;
pub mod validator;

pub use result::{ErrorEntry, Outcome, OutcomeError};
pub use validator::{check_all, pattern, rule, Validator, ValidatorChain, VALIDATION_ERROR_CODE};
