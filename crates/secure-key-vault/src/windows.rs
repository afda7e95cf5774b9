//! Windows Credential Vault implementation.

use crate::{SecureStorage, StorageError, StorageResult};
use tracing::debug;
use windows::{
    core::HSTRING,
    Security::Credentials::{PasswordCredential, PasswordVault},
};

/// HRESULT for ERROR_NOT_FOUND.
const NOT_FOUND: u32 = 0x8007_0490;

/// Credential Vault based secure storage.
pub struct CredentialStorage {
    resource: HSTRING,
    resource_name: String,
}

impl CredentialStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        PasswordVault::new().map_err(|e| {
            StorageError::Platform(format!("Failed to access Credential Vault: {}", e))
        })?;

        Ok(Self {
            resource: HSTRING::from(service_name),
            resource_name: service_name.to_string(),
        })
    }

    fn vault(&self) -> StorageResult<PasswordVault> {
        PasswordVault::new().map_err(|e| {
            StorageError::Platform(format!("Failed to access Credential Vault: {}", e))
        })
    }

    /// Look up the credential for `key`, mapping ERROR_NOT_FOUND to `None`.
    fn retrieve(&self, vault: &PasswordVault, key: &str) -> StorageResult<Option<PasswordCredential>> {
        match vault.Retrieve(&self.resource, &HSTRING::from(key)) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) if e.code().0 as u32 == NOT_FOUND => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to retrieve credential: {}",
                e
            ))),
        }
    }
}

impl SecureStorage for CredentialStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(resource = %self.resource_name, key = %key, "Setting credential");
        let vault = self.vault()?;

        if let Some(existing) = self.retrieve(&vault, key)? {
            vault
                .Remove(&existing)
                .map_err(|e| StorageError::Platform(format!("Failed to replace credential: {}", e)))?;
        }

        let credential = PasswordCredential::CreatePasswordCredential(
            &self.resource,
            &HSTRING::from(key),
            &HSTRING::from(value),
        )
        .map_err(|e| StorageError::Platform(format!("Failed to create credential: {}", e)))?;

        vault
            .Add(&credential)
            .map_err(|e| StorageError::Platform(format!("Failed to add credential: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(resource = %self.resource_name, key = %key, "Getting credential");
        let vault = self.vault()?;
        let Some(credential) = self.retrieve(&vault, key)? else {
            return Ok(None);
        };

        credential
            .RetrievePassword()
            .map_err(|e| StorageError::Platform(format!("Failed to retrieve password: {}", e)))?;
        let password = credential
            .Password()
            .map_err(|e| StorageError::Platform(format!("Failed to read password: {}", e)))?;

        Ok(Some(password.to_string()))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(resource = %self.resource_name, key = %key, "Deleting credential");
        let vault = self.vault()?;
        match self.retrieve(&vault, key)? {
            Some(credential) => {
                vault.Remove(&credential).map_err(|e| {
                    StorageError::Platform(format!("Failed to remove credential: {}", e))
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Windows Credential Vault access
    fn test_credential_roundtrip() {
        let storage = CredentialStorage::new("com.fieldsync.mobile.test").unwrap();
        let _ = storage.delete("test_key");

        storage.set("test_key", "first").unwrap();
        storage.set("test_key", "second").unwrap();
        assert_eq!(storage.get("test_key").unwrap(), Some("second".to_string()));

        assert!(storage.delete("test_key").unwrap());
        assert_eq!(storage.get("test_key").unwrap(), None);
    }
}
