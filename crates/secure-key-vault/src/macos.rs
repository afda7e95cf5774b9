//! macOS / iOS Keychain implementation.

use crate::{SecureStorage, StorageError, StorageResult};
use security_framework::base::Error as SecError;
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
    set_generic_password_options,
};
use security_framework::passwords_options::{AccessControlOptions, PasswordOptions};
use tracing::debug;

const ERR_SEC_USER_CANCELED: i32 = -128;
const ERR_SEC_AUTH_FAILED: i32 = -25293;
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// Keychain-based secure storage.
pub struct KeychainStorage {
    service_name: String,
}

impl KeychainStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn classify(&self, op: &str, err: SecError) -> StorageError {
        match err.code() {
            ERR_SEC_USER_CANCELED | ERR_SEC_AUTH_FAILED => {
                StorageError::Cancelled(format!("{op}: {err}"))
            }
            _ => StorageError::Platform(format!("Failed to {op} keychain item: {err}")),
        }
    }
}

impl SecureStorage for KeychainStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting keychain item");
        set_generic_password(&self.service_name, key, value.as_bytes())
            .map_err(|e| self.classify("set", e))
    }

    fn set_protected(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting access-controlled keychain item");

        // Access-controlled items cannot be updated in place.
        if let Err(e) = delete_generic_password(&self.service_name, key) {
            if e.code() != ERR_SEC_ITEM_NOT_FOUND {
                return Err(self.classify("replace", e));
            }
        }

        let mut options = PasswordOptions::new_generic_password(&self.service_name, key);
        options.set_access_control_options(AccessControlOptions::USER_PRESENCE);
        set_generic_password_options(value.as_bytes(), options)
            .map_err(|e| self.classify("set", e))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "Getting keychain item");
        match get_generic_password(&self.service_name, key) {
            Ok(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(self.classify("get", e)),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");
        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == ERR_SEC_ITEM_NOT_FOUND => Ok(false),
            Err(e) => Err(self.classify("delete", e)),
        }
    }
}
