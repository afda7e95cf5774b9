//! Status snapshots and listener management.

use super::harness::{lead_items, TestHarness};
use crate::SyncStatusSnapshot;
use field_database::EntityKind;
use std::time::Duration;

#[tokio::test]
async fn idle_store_can_sync() {
    let h = TestHarness::new().await;

    assert_eq!(
        h.orchestrator.get_sync_status().await,
        SyncStatusSnapshot {
            is_running: false,
            can_sync: true,
            last_sync_time: None,
        }
    );
}

#[tokio::test]
async fn offline_cannot_sync() {
    let h = TestHarness::new().await;
    h.connectivity.set_online(false);

    let status = h.orchestrator.get_sync_status().await;
    assert!(!status.can_sync);
    assert!(!status.is_running);
}

#[tokio::test]
async fn throttle_window_blocks_then_clears() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));
    h.orchestrator.manual_sync().await.unwrap();

    let status = h.orchestrator.get_sync_status().await;
    assert!(!status.can_sync);
    assert_eq!(status.last_sync_time, Some(h.now()));

    h.clock.advance(Duration::from_secs(31));
    assert!(h.orchestrator.get_sync_status().await.can_sync);
}

#[tokio::test]
async fn running_session_is_reported() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));
    let gate = h.source.close_gate();

    let orchestrator = h.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.manual_sync().await });
    h.source.fetch_started.notified().await;

    let status = h.orchestrator.get_sync_status().await;
    assert!(status.is_running);
    assert!(!status.can_sync);

    gate.add_permits(1);
    task.await.unwrap().unwrap();
    assert!(!h.orchestrator.get_sync_status().await.is_running);
}

#[tokio::test]
async fn removed_listeners_stop_receiving() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));
    let mut events = h.orchestrator.subscribe();

    h.orchestrator.remove_all_listeners();
    h.orchestrator.manual_sync().await.unwrap();

    assert_eq!(events.recv().await, None);
}
