//! # SyncOrchestrator: Paged Pull Sync for the FieldSync Store
//!
//! Pulls every business collection from the remote API into the encrypted
//! local store, one page per transaction, and reports progress through a
//! typed event hub.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │  PageSource  │────▶│ SyncOrchestrator │────▶│ Persistence  │
//! │ (remote API) │     │ (cursor + retry) │     │ (one tx/page)│
//! └──────────────┘     └────────┬─────────┘     └──────────────┘
//!                               │
//!                        ┌──────▼──────┐
//!                        │  EventHub   │
//!                        │ (listeners) │
//!                        └─────────────┘
//! ```
//!
//! ## Key Features
//!
//! - **Single flight**: concurrent callers share one in-flight session and
//!   receive the same outcome.
//!
//! - **Guards**: offline requests resolve as `SkippedOffline`; non-forced
//!   requests within `min_sync_interval` of the last success resolve as
//!   `Throttled`.
//!
//! - **Retry**: 5xx, timeouts and transport failures retry the same page with
//!   exponential backoff (1s → 2s → 4s). 401 ends the session and logs the
//!   user out; 429 is surfaced as is.
//!
//! - **Empty-page protection**: a page with no items while the server reports
//!   a non-zero total is skipped, never treated as a deletion.
//!
//! ## Example
//!
//! ```ignore
//! use sync_orchestrator::{SyncConfig, SyncDependencies, SyncOrchestrator};
//!
//! let deps = SyncDependencies::new(api, persistence, connectivity, auth);
//! let orchestrator = SyncOrchestrator::new(SyncConfig::from_env(), deps);
//!
//! let mut events = orchestrator.subscribe();
//! let outcome = orchestrator.manual_sync().await?;
//! ```

mod backoff;
mod clock;
mod collaborators;
mod config;
mod error;
mod events;
mod orchestrator;
mod pagination;
mod types;

#[cfg(test)]
mod tests;

pub use backoff::compute_backoff;
pub use clock::{Clock, TokioClock};
pub use collaborators::{AuthSession, Connectivity, CredentialError, StaticConnectivity};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use events::{EventHub, EventSubscription, SyncEvent};
pub use orchestrator::{SyncDependencies, SyncOrchestrator};
pub use pagination::PaginationCursor;
pub use types::{RecordCounts, SyncMode, SyncOutcome, SyncStatusSnapshot, SyncSummary};
