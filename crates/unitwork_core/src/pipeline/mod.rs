//! Entity manipulation pipeline and use-case service.
//!
//! # Responsibility
//! - Orchestrate validated, transactional writes against a session.
//! - Expose use-case level entry points to callers.

pub mod manipulation;
pub mod service;
