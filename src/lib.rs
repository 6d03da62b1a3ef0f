//! Pixie: a social blogging platform core.
//!
//! Trending ranking, read-through object caching with deletion-based
//! invalidation, and search over Postgres, exposed as a JSON API.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
