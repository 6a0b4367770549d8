//! Gatekeeper — library crate for the binary and integration tests.
//!
//! Re-exports modules needed by integration tests in `tests/`.

pub mod access;
pub mod codegen;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod local;
pub mod models;
pub mod notification;
pub mod store;
