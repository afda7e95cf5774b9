//! Non-retryable failures.

use super::harness::{leads_config, lead_items, FakeAuth, Step, TestHarness};
use crate::{CredentialError, SyncError, SyncEvent};
use field_api_client::ApiError;
use field_database::{EntityKind, Lead};
use serde_json::json;
use std::time::Duration;

fn failed_reasons(events: &[SyncEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::SyncFailed { reason, .. } => Some(reason.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn unauthorized_logs_out_without_retry() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));
    h.source.push_failures(401, 1);
    let mut events = h.orchestrator.subscribe();

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert_eq!(err, SyncError::AuthExpired);
    assert_eq!(h.source.call_count(), 1);
    assert!(h.clock.sleeps().is_empty());
    assert_eq!(h.auth.logouts().len(), 1);
    assert_eq!(failed_reasons(&events.drain()), vec!["auth_expired"]);
    assert!(!h.orchestrator.is_running());
}

#[tokio::test]
async fn missing_token_is_auth_expired() {
    let h = TestHarness::build(leads_config(), FakeAuth::new(None)).await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert_eq!(err, SyncError::AuthExpired);
    assert_eq!(h.source.call_count(), 0);
    assert_eq!(h.auth.logouts().len(), 1);
}

#[tokio::test]
async fn unreadable_credential_store_keeps_the_session() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));
    h.auth
        .fail_reads(Some(CredentialError::Cancelled("prompt dismissed".to_string())));
    let mut events = h.orchestrator.subscribe();

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert_eq!(
        err,
        SyncError::CredentialUnavailable(CredentialError::Cancelled("prompt dismissed".to_string()))
    );
    assert_eq!(h.source.call_count(), 0);
    assert!(h.auth.logouts().is_empty());
    assert_eq!(h.auth.token().as_deref(), Some(super::harness::TOKEN));
    assert_eq!(failed_reasons(&events.drain()), vec!["credential_cancelled"]);

    h.auth.fail_reads(None);
    h.orchestrator.manual_sync().await.unwrap();
    assert_eq!(h.lead_count().await, 5);
}

#[tokio::test]
async fn rate_limit_is_surfaced_verbatim() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(5));
    h.source.push_step(Step::Fail(ApiError::Status {
        status: 429,
        message: "slow down".to_string(),
        retry_after: Some(Duration::from_secs(5)),
    }));
    let mut events = h.orchestrator.subscribe();

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert_eq!(
        err,
        SyncError::RateLimited {
            retry_after: Some(Duration::from_secs(5))
        }
    );
    assert_eq!(h.source.call_count(), 1);
    assert!(h.clock.sleeps().is_empty());
    assert!(h.auth.logouts().is_empty());
    assert_eq!(failed_reasons(&events.drain()), vec!["rate_limited"]);
}

#[tokio::test]
async fn undecodable_item_rejects_the_whole_page() {
    let h = TestHarness::new().await;
    let mut items = lead_items(10);
    items[5] = json!({ "id": "lead-5", "phone": "no name" });
    h.source.set_collection(EntityKind::Leads, items);

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    match err {
        SyncError::MalformedPage { entity, message } => {
            assert_eq!(entity, EntityKind::Leads);
            assert!(message.contains("item 5"), "{message}");
        }
        other => panic!("expected MalformedPage, got {other:?}"),
    }
    assert_eq!(h.lead_count().await, 0);
}

#[tokio::test]
async fn store_failure_rolls_back_the_page() {
    let h = TestHarness::new().await;
    h.source.set_collection(EntityKind::Leads, lead_items(50));
    h.store
        .database()
        .call_sqlite(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_lead BEFORE INSERT ON leads WHEN NEW.id = 'lead-38'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
        })
        .await
        .unwrap();
    let mut events = h.orchestrator.subscribe();

    let err = h.orchestrator.manual_sync().await.unwrap_err();

    assert!(matches!(err, SyncError::Transaction(_)));
    // Page 1 committed; none of page 2 did.
    assert_eq!(h.lead_count().await, 25);
    let missing: Option<Lead> = h.store.find_by_id("lead-30").await.unwrap();
    assert!(missing.is_none());
    assert_eq!(failed_reasons(&events.drain()), vec!["transaction"]);
    assert_eq!(h.orchestrator.last_sync_time(), None);
}
