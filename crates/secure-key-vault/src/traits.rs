//! Storage trait definitions.

use crate::StorageResult;

/// Trait for secure storage backends
pub trait SecureStorage: Send + Sync {
    /// Store a value securely
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Store a value that may only be read back once the device is unlocked
    /// (passcode or biometric). Backends without access-control support
    /// fall back to a plain [`set`](Self::set).
    fn set_protected(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set(key, value)
    }

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns `false` if nothing was stored under `key`.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
