//! The sync session driver.
//!
//! A session walks every configured collection page by page, applying each
//! page to the local store in its own transaction. At most one session runs
//! at a time: callers arriving while one is in flight attach to the same
//! shared future and receive its outcome.

use crate::backoff::compute_backoff;
use crate::clock::{Clock, TokioClock};
use crate::collaborators::{AuthSession, Connectivity};
use crate::error::{classify, FetchFailure, SyncError, SyncResult};
use crate::events::{EventHub, EventSubscription, SyncEvent};
use crate::pagination::PaginationCursor;
use crate::types::{SyncMode, SyncOutcome, SyncSession, SyncStatusSnapshot, SyncSummary};
use crate::SyncConfig;
use chrono::{DateTime, Utc};
use field_api_client::{PageResponse, PageSource};
use field_database::{
    Commission, Customer, Document, EntityKind, EntityRecord, Lead, Persistence, Quotation,
    RecordOrigin,
};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

type SharedSync = Shared<BoxFuture<'static, SyncResult<SyncOutcome>>>;

const AUTH_EXPIRED_REASON: &str = "sync rejected the access token";

/// Everything a session talks to.
#[derive(Clone)]
pub struct SyncDependencies {
    pub source: Arc<dyn PageSource>,
    pub store: Persistence,
    pub connectivity: Arc<dyn Connectivity>,
    pub auth: Arc<dyn AuthSession>,
    pub clock: Arc<dyn Clock>,
}

impl SyncDependencies {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Persistence,
        connectivity: Arc<dyn Connectivity>,
        auth: Arc<dyn AuthSession>,
    ) -> Self {
        Self {
            source,
            store,
            connectivity,
            auth,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

struct InFlight {
    id: u64,
    future: SharedSync,
    cancel: CancellationToken,
}

struct Inner {
    config: SyncConfig,
    deps: SyncDependencies,
    events: EventHub,
    in_flight: Mutex<Option<InFlight>>,
    last_sync_time: Mutex<Option<DateTime<Utc>>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives synchronization of the local store with the remote API.
///
/// Cheap to clone; clones share the in-flight slot, the event hub and the
/// throttle clock.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, deps: SyncDependencies) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                deps,
                events: EventHub::new(),
                in_flight: Mutex::new(None),
                last_sync_time: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Run a sync, or join the one already running.
    ///
    /// The session itself runs on a spawned task, so dropping the returned
    /// future does not stop it; use [`cancel_sync`](Self::cancel_sync).
    pub async fn perform_sync(&self, mode: SyncMode) -> SyncResult<SyncOutcome> {
        let shared = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some(existing) => {
                    debug!(session = existing.id, ?mode, "Attaching to in-flight sync");
                    existing.future.clone()
                }
                None => {
                    let in_flight = self.start_session(mode);
                    let future = in_flight.future.clone();
                    *slot = Some(in_flight);
                    future
                }
            }
        };

        shared.await
    }

    pub async fn manual_sync(&self) -> SyncResult<SyncOutcome> {
        self.perform_sync(SyncMode::Manual).await
    }

    pub async fn timer_sync(&self) -> SyncResult<SyncOutcome> {
        self.perform_sync(SyncMode::Timer).await
    }

    /// Sync even inside the throttle window.
    pub async fn force_sync(&self) -> SyncResult<SyncOutcome> {
        self.perform_sync(SyncMode::Forced).await
    }

    /// Ask the running session to stop. Returns false if nothing was running.
    ///
    /// Fetches and backoff sleeps are interrupted; a page transaction that
    /// already started is allowed to commit.
    pub fn cancel_sync(&self) -> bool {
        match lock(&self.inner.in_flight).as_ref() {
            Some(in_flight) => {
                info!(session = in_flight.id, "Cancelling sync");
                in_flight.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.in_flight).is_some()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *lock(&self.inner.last_sync_time)
    }

    pub async fn get_sync_status(&self) -> SyncStatusSnapshot {
        let is_running = self.is_running();
        let online = self.inner.deps.connectivity.is_online().await;
        let throttled = self.inner.throttle_remaining().is_some();

        SyncStatusSnapshot {
            is_running,
            can_sync: !is_running && online && !throttled,
            last_sync_time: self.last_sync_time(),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.inner.events.subscribe()
    }

    pub fn remove_all_listeners(&self) {
        self.inner.events.remove_all_listeners();
    }

    /// Spawn a session task. Called with the in-flight slot locked, so the
    /// task cannot release the slot before it has been filled.
    fn start_session(&self, mode: SyncMode) -> InFlight {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let handle = tokio::spawn(
            async move { inner.run_session(id, mode, token).await }
                .instrument(info_span!("sync_session", session = id, ?mode)),
        );

        let weak = Arc::downgrade(&self.inner);
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    error!(session = id, error = %err, "Sync task did not complete");
                    if let Some(inner) = weak.upgrade() {
                        inner.release(id);
                    }
                    Err(SyncError::Internal(err.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        InFlight { id, future, cancel }
    }
}

impl Inner {
    async fn run_session(
        &self,
        id: u64,
        mode: SyncMode,
        cancel: CancellationToken,
    ) -> SyncResult<SyncOutcome> {
        let result = self.execute(mode, &cancel).await;

        // Terminal events go out while the slot is still held, so a session
        // started afterwards cannot emit `SyncStarted` ahead of them.
        match &result {
            Ok(SyncOutcome::Completed(summary)) => {
                *lock(&self.last_sync_time) = Some(self.deps.clock.now());
                info!(
                    records = summary.record_counts.total,
                    pages = summary.pages_processed,
                    duration_ms = summary.duration.as_millis() as u64,
                    "Sync finished"
                );
                self.events.emit(SyncEvent::SyncFinished {
                    duration: summary.duration,
                    record_counts: summary.record_counts.clone(),
                    pages_processed: summary.pages_processed,
                });
            }
            Ok(_) => {}
            Err(err) => {
                if matches!(err, SyncError::AuthExpired) {
                    self.deps.auth.force_logout(AUTH_EXPIRED_REASON).await;
                }
                warn!(reason = err.reason(), error = %err, "Sync failed");
                self.events.emit(SyncEvent::SyncFailed {
                    reason: err.reason().to_string(),
                    error: err.clone(),
                });
            }
        }
        self.release(id);

        result
    }

    async fn execute(
        &self,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncOutcome> {
        if !self.deps.connectivity.is_online().await {
            info!("Offline, skipping sync");
            return Ok(SyncOutcome::SkippedOffline);
        }

        if mode != SyncMode::Forced {
            if let Some(retry_after) = self.throttle_remaining() {
                debug!(retry_after_ms = retry_after.as_millis() as u64, "Sync throttled");
                return Ok(SyncOutcome::Throttled { retry_after });
            }
        }

        let started_at = self.deps.clock.now();
        let mut session = SyncSession::new(started_at);
        info!(entities = self.config.entities.len(), "Sync started");
        self.events.emit(SyncEvent::SyncStarted { mode, started_at });

        for &entity in &self.config.entities {
            self.sync_entity(entity, &mut session, cancel).await?;
        }

        let duration = (self.deps.clock.now() - session.started_at)
            .to_std()
            .unwrap_or_default();

        Ok(SyncOutcome::Completed(SyncSummary {
            started_at: session.started_at,
            duration,
            record_counts: session.record_counts,
            pages_processed: session.pages_processed,
        }))
    }

    async fn sync_entity(
        &self,
        entity: EntityKind,
        session: &mut SyncSession,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        let mut cursor = PaginationCursor::new(self.config.page_size);
        let mut processed: u64 = 0;

        while let Some(page) = cursor.next_page() {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let response = self.fetch_page(entity, &cursor, page, cancel).await?;
            if page == 1 {
                cursor.set_total(response.total);
            }

            if response.items.is_empty() {
                if response.total > 0 {
                    warn!(
                        %entity,
                        page,
                        total = response.total,
                        "Anomalous empty page, keeping cached rows"
                    );
                }
            } else {
                let applied = self.apply_page(entity, page, response.items).await?;
                processed += applied;
                session.record_counts.add(entity, applied);
            }

            cursor.mark_loaded(page);
            session.pages_processed += 1;
            debug!(%entity, page, total_pages = cursor.total_pages(), processed, "Page applied");
            self.events.emit(SyncEvent::SyncProgress {
                entity,
                current_page: page,
                total_pages: cursor.total_pages(),
                processed_records: processed,
            });
        }

        Ok(())
    }

    /// Fetch one page, retrying transient failures with backoff.
    async fn fetch_page(
        &self,
        entity: EntityKind,
        cursor: &PaginationCursor,
        page: u32,
        cancel: &CancellationToken,
    ) -> SyncResult<PageResponse> {
        let offset = cursor.offset(page);
        let mut retries = 0;

        loop {
            let bearer = self
                .deps
                .auth
                .bearer_token()
                .await?
                .ok_or(SyncError::AuthExpired)?;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                result = self.deps.source.fetch_page(entity.as_str(), offset, cursor.page_size(), &bearer) => result,
            };

            let message = match result {
                Ok(response) => return Ok(response),
                Err(err) => match classify(entity, err) {
                    FetchFailure::Fatal(err) => return Err(err),
                    FetchFailure::Retry(message) => message,
                },
            };

            if retries >= self.config.max_retries {
                return Err(SyncError::TransientNetwork {
                    attempts: retries + 1,
                    message,
                });
            }

            retries += 1;
            let delay = compute_backoff(retries, &self.config);
            warn!(
                %entity,
                page,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "Transient fetch failure, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = self.deps.clock.sleep(delay) => {}
            }
        }
    }

    /// Decode and store one page in a single transaction.
    async fn apply_page(&self, entity: EntityKind, page: u32, items: Vec<Value>) -> SyncResult<u64> {
        match entity {
            EntityKind::Leads => {
                let mut leads: Vec<Lead> = decode(entity, items)?;
                for lead in &mut leads {
                    lead.page_number = Some(i64::from(page));
                }
                self.store_page(leads).await
            }
            EntityKind::Customers => self.store_page(decode::<Customer>(entity, items)?).await,
            EntityKind::Quotations => self.store_page(decode::<Quotation>(entity, items)?).await,
            EntityKind::Commissions => self.store_page(decode::<Commission>(entity, items)?).await,
            EntityKind::Documents => self.store_page(decode::<Document>(entity, items)?).await,
        }
    }

    async fn store_page<R: EntityRecord>(&self, records: Vec<R>) -> SyncResult<u64> {
        let ids = self
            .deps
            .store
            .upsert_many(records, RecordOrigin::Remote)
            .await?;
        Ok(ids.len() as u64)
    }

    /// Time left in the throttle window, if any.
    fn throttle_remaining(&self) -> Option<Duration> {
        let last = (*lock(&self.last_sync_time))?;
        let elapsed = (self.deps.clock.now() - last).to_std().unwrap_or_default();
        self.config
            .min_sync_interval
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Clear the in-flight slot if it still belongs to session `id`.
    fn release(&self, id: u64) {
        let mut slot = lock(&self.in_flight);
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *slot = None;
        }
    }
}

fn decode<R: DeserializeOwned>(entity: EntityKind, items: Vec<Value>) -> SyncResult<Vec<R>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|err| SyncError::MalformedPage {
                entity,
                message: format!("item {index}: {err}"),
            })
        })
        .collect()
}
