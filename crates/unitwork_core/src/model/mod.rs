//! Entity abstractions shared by sessions and the pipeline.
//!
//! # Responsibility
//! - Define identity and persistence capabilities of domain entities.
//! - Define the tracked-entity lifecycle states.
//!
//! # Invariants
//! - Every tracked entity is addressed by `(ENTITY_TYPE, id)`.

pub mod entity;
