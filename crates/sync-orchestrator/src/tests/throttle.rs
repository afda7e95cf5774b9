//! Offline and throttle guards.

use super::harness::{lead_items, TestHarness};
use crate::SyncOutcome;
use field_database::EntityKind;
use std::time::Duration;

#[tokio::test]
async fn offline_skips_without_fetching() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));
    h.connectivity.set_online(false);
    let mut events = h.orchestrator.subscribe();

    let outcome = h.orchestrator.manual_sync().await.unwrap();

    assert_eq!(outcome, SyncOutcome::SkippedOffline);
    assert_eq!(h.source.call_count(), 0);
    assert!(events.drain().is_empty());
    assert_eq!(h.orchestrator.last_sync_time(), None);
}

#[tokio::test]
async fn offline_applies_to_forced_sync_too() {
    let h = TestHarness::new().await;
    h.connectivity.set_online(false);

    let outcome = h.orchestrator.force_sync().await.unwrap();
    assert_eq!(outcome, SyncOutcome::SkippedOffline);
}

#[tokio::test]
async fn second_manual_sync_inside_window_is_throttled() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));

    h.orchestrator.manual_sync().await.unwrap();
    let calls = h.source.call_count();

    let outcome = h.orchestrator.manual_sync().await.unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Throttled {
            retry_after: Duration::from_secs(30)
        }
    );
    assert_eq!(h.source.call_count(), calls);

    h.clock.advance(Duration::from_secs(10));
    let outcome = h.orchestrator.timer_sync().await.unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Throttled {
            retry_after: Duration::from_secs(20)
        }
    );
}

#[tokio::test]
async fn force_sync_bypasses_throttle() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));

    h.orchestrator.manual_sync().await.unwrap();
    assert!(matches!(
        h.orchestrator.manual_sync().await.unwrap(),
        SyncOutcome::Throttled { .. }
    ));

    let outcome = h.orchestrator.force_sync().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed(_)));
    assert_eq!(h.source.call_count(), 2);
}

#[tokio::test]
async fn window_expires_after_interval() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));

    h.orchestrator.manual_sync().await.unwrap();
    h.clock.advance(Duration::from_secs(30));

    let outcome = h.orchestrator.manual_sync().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed(_)));
}

#[tokio::test]
async fn failed_sync_does_not_start_window() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));
    h.source.push_failures(404, 1);

    assert!(h.orchestrator.manual_sync().await.is_err());
    assert_eq!(h.orchestrator.last_sync_time(), None);

    let outcome = h.orchestrator.manual_sync().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed(_)));

    let status = h.orchestrator.get_sync_status().await;
    assert_eq!(status.last_sync_time, Some(h.now()));
}
