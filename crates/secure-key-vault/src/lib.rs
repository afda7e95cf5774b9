//! Secure storage and key lifecycle for the FieldSync local store.
//!
//! This crate provides platform-specific secure storage implementations:
//! - **macOS / iOS**: Keychain via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Windows**: Credential Vault via `windows` crate
//!
//! On top of the raw vault sits [`KeyManager`], which owns the 64-byte secret
//! that unlocks the encrypted local database.

mod key_manager;
mod keys;
mod memory;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

pub use key_manager::{
    is_well_formed, EncryptionKey, KeyError, KeyManager, KeyResult, KEY_BYTES, KEY_HEX_LEN,
};
pub use keys::StorageKeys;
pub use memory::{MemoryFault, MemoryStorage};
pub use traits::SecureStorage;

use std::sync::Arc;
use thiserror::Error;

/// Service name used for all vault entries.
pub const SERVICE_NAME: &str = "com.fieldsync.mobile";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// The user dismissed the unlock / biometric prompt
    #[error("Vault access cancelled by user: {0}")]
    Cancelled(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default platform-specific storage implementation.
pub fn create_storage() -> StorageResult<Box<dyn SecureStorage>> {
    #[cfg(target_os = "macos")]
    {
        let storage = macos::KeychainStorage::new(SERVICE_NAME)?;
        Ok(Box::new(storage))
    }

    #[cfg(target_os = "linux")]
    {
        let storage = linux::SecretServiceStorage::new(SERVICE_NAME)?;
        Ok(Box::new(storage))
    }

    #[cfg(target_os = "windows")]
    {
        let storage = windows::CredentialStorage::new(SERVICE_NAME)?;
        Ok(Box::new(storage))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(StorageError::Platform(
            "No secure storage implementation available for this platform".to_string(),
        ))
    }
}

/// [`KeyManager`] over the platform vault.
pub fn create_key_manager() -> StorageResult<KeyManager> {
    let storage: Arc<dyn SecureStorage> = Arc::from(create_storage()?);
    Ok(KeyManager::new(storage))
}
