//! Single-flight behavior.

use super::harness::{lead_items, TestHarness};
use crate::{SyncEvent, SyncMode, SyncOutcome};
use field_database::EntityKind;

#[tokio::test]
async fn concurrent_calls_share_one_fetch_sequence() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(40));
    let mut events = h.orchestrator.subscribe();

    let (first, second) = tokio::join!(
        h.orchestrator.perform_sync(SyncMode::Manual),
        h.orchestrator.perform_sync(SyncMode::Timer),
    );

    let first = first.unwrap();
    assert!(matches!(first, SyncOutcome::Completed(_)));
    assert_eq!(first, second.unwrap());

    // 40 leads at 25 per page: exactly one walk of two pages.
    assert_eq!(h.source.call_count(), 2);
    let started = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::SyncStarted { .. }))
        .count();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn attached_caller_sees_the_same_failure() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));
    h.source.push_failures(401, 1);

    let (first, second) = tokio::join!(
        h.orchestrator.manual_sync(),
        h.orchestrator.force_sync(),
    );

    assert_eq!(first.unwrap_err(), crate::SyncError::AuthExpired);
    assert_eq!(second.unwrap_err(), crate::SyncError::AuthExpired);
    assert_eq!(h.source.call_count(), 1);
    assert_eq!(h.auth.logouts().len(), 1);
}

#[tokio::test]
async fn slot_is_released_after_completion() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));

    h.orchestrator.force_sync().await.unwrap();
    assert!(!h.orchestrator.is_running());

    h.orchestrator.force_sync().await.unwrap();
    assert_eq!(h.source.call_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn back_to_back_sessions_never_interleave_events() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(3));
    let mut events = h.orchestrator.subscribe();

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    orchestrator.force_sync().await.unwrap();
                }
            })
        })
        .collect();
    for caller in callers {
        caller.await.unwrap();
    }

    let mut open = false;
    for event in events.drain() {
        match event {
            SyncEvent::SyncStarted { .. } => {
                assert!(!open, "session started before the previous one finished");
                open = true;
            }
            SyncEvent::SyncFinished { .. } | SyncEvent::SyncFailed { .. } => {
                assert!(open);
                open = false;
            }
            SyncEvent::SyncProgress { .. } => assert!(open),
        }
    }
    assert!(!open);
}
