//! Remote API adapter for FieldSync.
//!
//! Collections are served as offset/limit pages:
//!
//! ```text
//! GET <base>/<collection>?offset=<n>&limit=<page_size>
//! Authorization: Bearer <token>
//! → { "items": [...], "total": <n> }
//! ```
//!
//! [`PageSource`] is the contract the sync engine depends on;
//! [`FieldApiClient`] is the reqwest implementation. Non-success statuses
//! surface as [`ApiError::Status`] with any `Retry-After` hint attached, and
//! classification into retryable or fatal is left to the caller.

mod client;
mod error;
mod types;

pub use client::{ClientConfig, FieldApiClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ApiError, ApiResult};
pub use types::{PageResponse, PageSource};
