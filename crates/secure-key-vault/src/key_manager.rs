//! Lifecycle of the local database encryption key.
//!
//! The key is 64 random bytes, stored hex-encoded in the OS vault. It is
//! created lazily on first access and re-validated on every read; a stored
//! value that fails the format check is replaced rather than reported.

use crate::{SecureStorage, StorageError, StorageKeys};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Raw key length in bytes.
pub const KEY_BYTES: usize = 64;

/// Hex-encoded key length in characters.
pub const KEY_HEX_LEN: usize = KEY_BYTES * 2;

/// Errors surfaced by [`KeyManager::get_key`].
#[derive(Error, Debug)]
pub enum KeyError {
    /// The vault could not be reached or refused the operation.
    #[error("Secure vault unavailable: {0}")]
    Access(#[source] StorageError),

    /// The user declined the unlock prompt.
    #[error("Vault unlock cancelled by user")]
    Cancelled,
}

impl From<StorageError> for KeyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled(_) => KeyError::Cancelled,
            other => KeyError::Access(other),
        }
    }
}

pub type KeyResult<T> = Result<T, KeyError>;

/// Stored value rejected by the format check. Never leaves this module.
#[derive(Error, Debug)]
enum KeyFormatError {
    #[error("expected 128 characters, found {0}")]
    Length(usize),
    #[error("non-hex character at offset {0}")]
    NotHex(usize),
}

/// Hex-encoded database secret.
///
/// `Debug` never prints the material.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey(String);

impl EncryptionKey {
    fn generate() -> Self {
        let mut bytes = [0u8; KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accept an externally supplied key if it passes the format check.
    pub fn parse(value: &str) -> Option<Self> {
        check_format(value).ok().map(|()| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

fn check_format(value: &str) -> Result<(), KeyFormatError> {
    if value.len() != KEY_HEX_LEN {
        return Err(KeyFormatError::Length(value.len()));
    }
    match value.bytes().position(|b| !b.is_ascii_hexdigit()) {
        Some(offset) => Err(KeyFormatError::NotHex(offset)),
        None => Ok(()),
    }
}

/// Returns true if `value` is 128 hex characters (either case).
pub fn is_well_formed(value: &str) -> bool {
    check_format(value).is_ok()
}

/// Owns the database secret stored in the vault.
///
/// Cloning shares the vault handle.
#[derive(Clone)]
pub struct KeyManager {
    storage: Arc<dyn SecureStorage>,
    account: String,
}

impl KeyManager {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self::with_account(storage, StorageKeys::LOCAL_DATABASE_KEY)
    }

    pub fn with_account(storage: Arc<dyn SecureStorage>, account: &str) -> Self {
        Self {
            storage,
            account: account.to_string(),
        }
    }

    /// Return the stored key, generating and persisting a new one if the
    /// vault holds nothing usable.
    pub fn get_key(&self) -> KeyResult<EncryptionKey> {
        match self.storage.get(&self.account)? {
            Some(stored) => match check_format(&stored) {
                Ok(()) => return Ok(EncryptionKey(stored)),
                Err(reason) => {
                    warn!(account = %self.account, %reason, "Stored database key is malformed, regenerating");
                }
            },
            None => debug!(account = %self.account, "No database key in vault"),
        }

        let key = EncryptionKey::generate();
        self.storage.set_protected(&self.account, key.as_str())?;
        info!(account = %self.account, "Generated new database key");
        Ok(key)
    }

    /// Remove the key. Failures are logged and swallowed.
    pub fn reset_key(&self) {
        match self.storage.delete(&self.account) {
            Ok(true) => info!(account = %self.account, "Database key removed"),
            Ok(false) => debug!(account = %self.account, "No database key to remove"),
            Err(e) => warn!(account = %self.account, error = %e, "Failed to remove database key"),
        }
    }

    /// Whether a well-formed key is currently stored. Never fails.
    pub fn has_key(&self) -> bool {
        match self.storage.get(&self.account) {
            Ok(Some(stored)) => is_well_formed(&stored),
            Ok(None) => false,
            Err(e) => {
                debug!(account = %self.account, error = %e, "Vault probe failed");
                false
            }
        }
    }
}
