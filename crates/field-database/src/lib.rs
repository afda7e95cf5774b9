//! Encrypted local store for the FieldSync data layer.
//!
//! This crate provides:
//! - [`DatabaseHandle`], an async SQLite executor on a dedicated thread,
//!   keyed with the vault-held [`EncryptionKey`](secure_key_vault::EncryptionKey)
//! - [`SchemaMigrator`], versioned and validated schema steps tracked in
//!   `PRAGMA user_version`
//! - the entity record types and [`persistence`] helpers for atomic batch
//!   upserts and bounded reads
//!
//! **Important**: Only SQL operations should run inside `db.call()`.

mod error;
mod executor;
pub mod migrations;
mod models;
pub mod persistence;

pub use error::{DatabaseError, DatabaseResult, MigrationError, MigrationResult};
pub use executor::DatabaseHandle;
pub use migrations::{
    current_version, MigrationReport, MigrationStep, SchemaMigrator, CURRENT_SCHEMA_VERSION,
};
pub use models::*;
pub use persistence::{Persistence, RecordOrigin};

/// Re-exported so callers can build query parameters without depending on rusqlite.
pub use rusqlite::types::Value as SqlValue;
