//! FieldSync command-line client: bootstraps the vault key, the encrypted
//! store and the sync orchestrator.

pub mod app;
pub mod auth;
pub mod config;
pub mod logging;
