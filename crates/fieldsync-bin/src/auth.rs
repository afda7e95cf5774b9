//! Vault-backed session credential.

use async_trait::async_trait;
use secure_key_vault::{SecureStorage, StorageError, StorageKeys, StorageResult};
use std::sync::Arc;
use sync_orchestrator::{AuthSession, CredentialError};
use tracing::{info, warn};

/// Reads the access token stored by the sign-in flow.
///
/// Vault calls can block on an unlock prompt, so they run on the blocking pool.
#[derive(Clone)]
pub struct VaultAuthSession {
    storage: Arc<dyn SecureStorage>,
}

impl VaultAuthSession {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Store a token issued elsewhere.
    pub fn store_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS_TOKEN, token)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, CredentialError>
    where
        F: FnOnce(&dyn SecureStorage) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        match tokio::task::spawn_blocking(move || f(storage.as_ref())).await {
            Ok(result) => result.map_err(credential_error),
            Err(e) => {
                warn!(error = %e, "Vault task failed");
                Err(CredentialError::Unavailable(e.to_string()))
            }
        }
    }
}

fn credential_error(err: StorageError) -> CredentialError {
    match err {
        StorageError::Cancelled(message) => CredentialError::Cancelled(message),
        other => CredentialError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl AuthSession for VaultAuthSession {
    async fn bearer_token(&self) -> Result<Option<String>, CredentialError> {
        let token = self
            .blocking(|storage| storage.get(StorageKeys::ACCESS_TOKEN))
            .await
            .inspect_err(|e| warn!(error = %e, "Could not read access token"))?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    async fn force_logout(&self, reason: &str) {
        info!(reason, "Signing out");
        if let Err(e) = self
            .blocking(|storage| storage.delete(StorageKeys::ACCESS_TOKEN))
            .await
        {
            warn!(error = %e, "Could not remove access token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secure_key_vault::{MemoryFault, MemoryStorage};

    #[tokio::test]
    async fn test_token_round_trip_and_logout() {
        let storage = Arc::new(MemoryStorage::new());
        let session = VaultAuthSession::new(storage.clone());

        assert_eq!(session.bearer_token().await, Ok(None));

        session.store_token("abc").unwrap();
        assert_eq!(session.bearer_token().await, Ok(Some("abc".to_string())));

        session.force_logout("expired").await;
        assert_eq!(session.bearer_token().await, Ok(None));
        assert!(!storage.has(StorageKeys::ACCESS_TOKEN).unwrap());
    }

    #[tokio::test]
    async fn test_empty_token_means_signed_out() {
        let session = VaultAuthSession::new(Arc::new(MemoryStorage::new()));
        session.store_token("").unwrap();
        assert_eq!(session.bearer_token().await, Ok(None));
    }

    #[tokio::test]
    async fn test_unreachable_vault_is_an_error_not_a_logout() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(StorageKeys::ACCESS_TOKEN, "abc").unwrap();
        storage.set_fault(Some(MemoryFault::Unreachable));

        let session = VaultAuthSession::new(storage.clone());
        assert!(matches!(
            session.bearer_token().await,
            Err(CredentialError::Unavailable(_))
        ));

        storage.set_fault(None);
        assert_eq!(session.bearer_token().await, Ok(Some("abc".to_string())));
    }

    #[tokio::test]
    async fn test_dismissed_prompt_is_cancelled() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(StorageKeys::ACCESS_TOKEN, "abc").unwrap();
        storage.set_fault(Some(MemoryFault::Cancelled));

        let session = VaultAuthSession::new(storage.clone());
        assert!(matches!(
            session.bearer_token().await,
            Err(CredentialError::Cancelled(_))
        ));

        storage.set_fault(None);
        assert!(storage.has(StorageKeys::ACCESS_TOKEN).unwrap());
    }
}
