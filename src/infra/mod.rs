//! Infrastructure adapters: Postgres repositories, HTTP surface, external
//! collaborators and telemetry.

pub mod auth;
pub mod compose;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod uploads;
