//! Linux Secret Service implementation.

use crate::{SecureStorage, StorageError, StorageResult};
use secret_service::blocking::{Collection, SecretService};
use secret_service::{EncryptionType, Error as SsError};
use std::collections::HashMap;
use tracing::debug;

/// Secret Service based secure storage (GNOME Keyring, KWallet).
pub struct SecretServiceStorage {
    service_name: String,
}

fn classify(err: SsError) -> StorageError {
    match err {
        SsError::Prompt => StorageError::Cancelled("unlock prompt dismissed".to_string()),
        other => StorageError::Platform(other.to_string()),
    }
}

impl SecretServiceStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        SecretService::connect(EncryptionType::Dh).map_err(|e| {
            StorageError::Platform(format!("Failed to connect to Secret Service: {}", e))
        })?;

        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn with_collection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Collection) -> StorageResult<T>,
    {
        let ss = SecretService::connect(EncryptionType::Dh).map_err(classify)?;
        let collection = ss.get_default_collection().map_err(classify)?;

        // Locked collections raise an unlock prompt; dismissal is a cancel.
        if collection.is_locked().map_err(classify)? {
            collection.unlock().map_err(classify)?;
        }

        f(&collection)
    }

    fn attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        HashMap::from([("service", self.service_name.as_str()), ("account", key)])
    }
}

impl SecureStorage for SecretServiceStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting secret");
        self.with_collection(|collection| {
            let label = format!("{}/{}", self.service_name, key);
            collection
                .create_item(&label, self.attributes(key), value.as_bytes(), true, "text/plain")
                .map_err(classify)?;
            Ok(())
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "Getting secret");
        self.with_collection(|collection| {
            let items = collection.search_items(self.attributes(key)).map_err(classify)?;
            let Some(item) = items.first() else {
                return Ok(None);
            };
            let secret = item.get_secret().map_err(classify)?;
            String::from_utf8(secret)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string()))
        })
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");
        self.with_collection(|collection| {
            let items = collection.search_items(self.attributes(key)).map_err(classify)?;
            if items.is_empty() {
                return Ok(false);
            }
            for item in &items {
                item.delete().map_err(classify)?;
            }
            Ok(true)
        })
    }
}
