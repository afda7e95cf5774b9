//! In-memory vault backend for tests and headless runs.

use crate::{SecureStorage, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Failure mode injected into a [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    /// Every call fails as if the vault daemon were down.
    Unreachable,
    /// Every call fails as if the user dismissed the unlock prompt.
    Cancelled,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, String>,
    protected: HashSet<String>,
    fault: Option<MemoryFault>,
}

/// Volatile [`SecureStorage`] with optional fault injection.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `fault`, or clear it with `None`.
    pub fn set_fault(&self, fault: Option<MemoryFault>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fault = fault;
        }
    }

    /// Whether `key` was last written through [`SecureStorage::set_protected`].
    pub fn is_protected(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.protected.contains(key))
            .unwrap_or(false)
    }

    /// Write a raw value, bypassing faults. Used to plant corrupt entries.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.values.insert(key.to_string(), value.to_string());
        }
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> StorageResult<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StorageError::Platform(format!("memory vault poisoned: {e}")))?;
        match inner.fault {
            Some(MemoryFault::Unreachable) => Err(StorageError::Platform(
                "memory vault unreachable".to_string(),
            )),
            Some(MemoryFault::Cancelled) => Err(StorageError::Cancelled(
                "unlock prompt dismissed".to_string(),
            )),
            None => Ok(f(&mut inner)),
        }
    }
}

impl SecureStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_inner(|inner| {
            inner.protected.remove(key);
            inner.values.insert(key.to_string(), value.to_string());
        })
    }

    fn set_protected(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_inner(|inner| {
            inner.protected.insert(key.to_string());
            inner.values.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_inner(|inner| inner.values.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.with_inner(|inner| {
            inner.protected.remove(key);
            inner.values.remove(key).is_some()
        })
    }
}
