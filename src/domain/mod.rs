//! Domain model: entities, scoring, and invariants independent of storage.

pub mod entities;
pub mod error;
pub mod scoring;
