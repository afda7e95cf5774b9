//! Sync tuning knobs.

use field_database::EntityKind;
use std::time::Duration;
use tracing::warn;

/// Configuration for paging, throttling and retry behavior.
///
/// # Backoff Calculation
///
/// Retry delay follows `backoff_base * 2^(attempt - 1)` capped at
/// `backoff_max`. With the defaults a failing page waits 1s, 2s, then 4s
/// before giving up after `max_retries` retries.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Records requested per page.
    pub page_size: u32,
    /// Minimum gap after a successful sync before a non-forced one may start.
    pub min_sync_interval: Duration,
    /// First retry delay.
    pub backoff_base: Duration,
    /// Cap on any single retry delay.
    pub backoff_max: Duration,
    /// Retries per page after the first attempt.
    pub max_retries: u32,
    /// Collections synced, in order.
    pub entities: Vec<EntityKind>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            min_sync_interval: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            max_retries: 3,
            entities: EntityKind::ALL.to_vec(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `FIELDSYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| -> Option<u64> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparsable sync setting");
                    None
                }
            }
        };

        let page_size = number("FIELDSYNC_PAGE_SIZE")
            .map(|n| n.clamp(1, u32::MAX as u64) as u32)
            .unwrap_or(defaults.page_size);
        let min_sync_interval = number("FIELDSYNC_MIN_SYNC_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.min_sync_interval);
        let backoff_base = number("FIELDSYNC_BACKOFF_BASE_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff_base);
        let backoff_max = number("FIELDSYNC_BACKOFF_MAX_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.backoff_max);
        let max_retries = number("FIELDSYNC_MAX_RETRIES")
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(defaults.max_retries);

        let entities = match lookup("FIELDSYNC_ENTITIES") {
            Some(raw) => {
                let parsed: Vec<EntityKind> = raw
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .filter_map(|s| match s.parse() {
                        Ok(kind) => Some(kind),
                        Err(e) => {
                            warn!(error = %e, "Ignoring unknown entity in FIELDSYNC_ENTITIES");
                            None
                        }
                    })
                    .collect();
                if parsed.is_empty() {
                    defaults.entities
                } else {
                    parsed
                }
            }
            None => defaults.entities,
        };

        Self {
            page_size,
            min_sync_interval,
            backoff_base,
            backoff_max,
            max_retries,
            entities,
        }
    }
}
