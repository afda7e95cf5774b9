use chrono::{DateTime, Utc};
use field_database::EntityKind;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Who asked for a sync. Only `Forced` bypasses the throttle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Manual,
    Timer,
    Forced,
}

/// Records applied per collection during one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub per_entity: HashMap<EntityKind, u64>,
    pub total: u64,
}

impl RecordCounts {
    pub fn add(&mut self, entity: EntityKind, count: u64) {
        *self.per_entity.entry(entity).or_default() += count;
        self.total += count;
    }

    pub fn get(&self, entity: EntityKind) -> u64 {
        self.per_entity.get(&entity).copied().unwrap_or(0)
    }
}

/// Result of a session that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub record_counts: RecordCounts,
    pub pages_processed: u32,
}

/// Successful resolutions of `perform_sync`.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Completed(SyncSummary),
    /// No network; nothing was attempted.
    SkippedOffline,
    /// A successful sync finished less than `min_sync_interval` ago.
    Throttled { retry_after: Duration },
}

/// Snapshot returned by `get_sync_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatusSnapshot {
    pub is_running: bool,
    /// False while running, offline or inside the throttle window.
    pub can_sync: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Transient per-run state. Created when a session starts, discarded at its
/// terminal event.
#[derive(Debug, Clone)]
pub(crate) struct SyncSession {
    pub started_at: DateTime<Utc>,
    pub pages_processed: u32,
    pub record_counts: RecordCounts,
}

impl SyncSession {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            pages_processed: 0,
            record_counts: RecordCounts::default(),
        }
    }
}
