use crate::SyncConfig;
use std::time::Duration;

/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`,
/// capped at `backoff_max`. Zero for `retry == 0`.
pub fn compute_backoff(retry: u32, config: &SyncConfig) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let base_ms = config.backoff_base.as_millis() as u64;
    let max_ms = config.backoff_max.as_millis() as u64;
    let multiplier = 1u64.checked_shl(retry - 1).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);

    Duration::from_millis(delay_ms)
}
