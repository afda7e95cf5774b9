//! Sync failure taxonomy and classification of lower-level errors.

use crate::collaborators::CredentialError;
use field_api_client::ApiError;
use field_database::{DatabaseError, EntityKind};
use std::time::Duration;
use thiserror::Error;

/// Why a sync session failed.
///
/// `Clone` so that every caller attached to the same in-flight session
/// receives the same outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// Server errors, timeouts or transport failures outlasted the retries.
    #[error("Network unavailable after {attempts} attempts: {message}")]
    TransientNetwork { attempts: u32, message: String },

    /// The server rejected the credential, or the user is signed out.
    #[error("Authentication expired")]
    AuthExpired,

    /// The credential store could not be read; the session is left alone.
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(CredentialError),

    /// The server asked us to slow down.
    #[error("Rate limited by server")]
    RateLimited { retry_after: Option<Duration> },

    /// Writing a page to the local store failed; the page was rolled back.
    #[error("Local transaction failed: {0}")]
    Transaction(String),

    /// A response that will not improve on retry: bad body, record that
    /// fails to decode, or a non-retryable client error.
    #[error("Malformed page for {entity}: {message}")]
    MalformedPage { entity: EntityKind, message: String },

    #[error("Sync cancelled")]
    Cancelled,

    /// The session task panicked or was aborted.
    #[error("Sync task failed: {0}")]
    Internal(String),
}

impl SyncError {
    /// Short machine-readable reason, used in `SyncFailed` events.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TransientNetwork { .. } => "transient_network",
            Self::AuthExpired => "auth_expired",
            Self::CredentialUnavailable(CredentialError::Cancelled(_)) => "credential_cancelled",
            Self::CredentialUnavailable(CredentialError::Unavailable(_)) => "credential_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::Transaction(_) => "transaction",
            Self::MalformedPage { .. } => "malformed_page",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<DatabaseError> for SyncError {
    fn from(err: DatabaseError) -> Self {
        Self::Transaction(err.to_string())
    }
}

impl From<CredentialError> for SyncError {
    fn from(err: CredentialError) -> Self {
        Self::CredentialUnavailable(err)
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// What to do with a failed fetch.
#[derive(Debug)]
pub(crate) enum FetchFailure {
    /// Worth another attempt after backoff.
    Retry(String),
    /// Stop the session with this error.
    Fatal(SyncError),
}

pub(crate) fn classify(entity: EntityKind, err: ApiError) -> FetchFailure {
    if err.is_unauthorized() {
        return FetchFailure::Fatal(SyncError::AuthExpired);
    }
    if err.is_rate_limited() {
        return FetchFailure::Fatal(SyncError::RateLimited {
            retry_after: err.retry_after(),
        });
    }
    if err.is_transient() {
        return FetchFailure::Retry(err.to_string());
    }
    FetchFailure::Fatal(SyncError::MalformedPage {
        entity,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, retry_after: Option<Duration>) -> ApiError {
        ApiError::Status {
            status: code,
            message: "body".to_string(),
            retry_after,
        }
    }

    #[test]
    fn test_classification() {
        assert!(matches!(
            classify(EntityKind::Leads, status(401, None)),
            FetchFailure::Fatal(SyncError::AuthExpired)
        ));
        assert!(matches!(
            classify(EntityKind::Leads, status(429, Some(Duration::from_secs(3)))),
            FetchFailure::Fatal(SyncError::RateLimited { retry_after: Some(d) }) if d == Duration::from_secs(3)
        ));
        assert!(matches!(
            classify(EntityKind::Leads, status(502, None)),
            FetchFailure::Retry(_)
        ));
        assert!(matches!(
            classify(EntityKind::Quotations, status(404, None)),
            FetchFailure::Fatal(SyncError::MalformedPage { entity: EntityKind::Quotations, .. })
        ));
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(SyncError::Cancelled.reason(), "cancelled");
        assert_eq!(SyncError::Transaction("x".into()).reason(), "transaction");
        assert_eq!(
            SyncError::from(CredentialError::Cancelled("prompt".into())).reason(),
            "credential_cancelled"
        );
    }
}
