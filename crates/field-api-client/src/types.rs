//! Page envelope and the fetch contract.

use crate::error::ApiResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One page of a collection: `{ "items": [...], "total": n }`.
///
/// Items stay untyped here; the caller decides which record type they map to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    pub total: u64,
}

/// Anything that can serve offset/limit pages of a named collection.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `GET <base>/<collection>?offset=<offset>&limit=<limit>` with
    /// `Authorization: Bearer <bearer>`.
    async fn fetch_page(
        &self,
        collection: &str,
        offset: u64,
        limit: u32,
        bearer: &str,
    ) -> ApiResult<PageResponse>;
}
