//! Interfaces to the auth flow and the network monitor.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// The credential store could not be read. Says nothing about whether the
/// credential itself is still valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Credential access cancelled: {0}")]
    Cancelled(String),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Source of the bearer credential. Owned by the authentication flow.
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Current access token. `Ok(None)` means the user is signed out.
    async fn bearer_token(&self) -> Result<Option<String>, CredentialError>;

    /// Drop the session after the server rejected the credential.
    async fn force_logout(&self, reason: &str);
}

/// Reachability probe.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Connectivity flag flipped by whoever observes the network.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
