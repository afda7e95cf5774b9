//! Backoff on transient failures.

use super::harness::{lead_items, status_error, Step, TestHarness};
use crate::{SyncError, SyncOutcome};
use field_api_client::ApiError;
use field_database::EntityKind;
use std::time::Duration;

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

#[tokio::test]
async fn three_server_errors_then_success() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(10));
    h.source.push_failures(503, 3);

    let outcome = h.orchestrator.manual_sync().await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Completed(_)));
    assert_eq!(h.source.call_count(), 4);
    assert_eq!(h.clock.sleeps(), secs(&[1, 2, 4]));
    assert_eq!(h.lead_count().await, 10);
}

#[tokio::test]
async fn retries_exhausted_keeps_committed_pages() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(50));
    h.source.push_step(Step::Serve);
    h.source.push_failures(500, 4);

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert!(matches!(err, SyncError::TransientNetwork { attempts: 4, .. }));
    assert_eq!(h.source.call_count(), 5);
    assert_eq!(h.clock.sleeps(), secs(&[1, 2, 4]));
    assert_eq!(h.lead_count().await, 25);
    assert_eq!(h.orchestrator.last_sync_time(), None);
}

#[tokio::test]
async fn retry_requests_the_same_page() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(30));
    h.source.push_step(Step::Serve);
    h.source.push_failures(502, 1);

    h.orchestrator.manual_sync().await.unwrap();

    let offsets: Vec<u64> = h.source.calls().iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![0, 25, 25]);
}

#[tokio::test]
async fn gateway_errors_are_retried_like_server_errors() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));
    h.source.push_step(Step::Fail(status_error(504)));
    h.source.push_step(Step::Fail(ApiError::Status {
        status: 503,
        message: "maintenance".to_string(),
        retry_after: None,
    }));

    h.orchestrator.manual_sync().await.unwrap();
    assert_eq!(h.clock.sleeps(), secs(&[1, 2]));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));
    h.source.push_failures(400, 1);

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::MalformedPage {
            entity: EntityKind::Leads,
            ..
        }
    ));
    assert_eq!(h.source.call_count(), 1);
    assert!(h.clock.sleeps().is_empty());
}
