//! Command implementations.

use crate::auth::VaultAuthSession;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use field_api_client::{ClientConfig, FieldApiClient};
use field_database::{
    Commission, Customer, DatabaseHandle, DatabaseResult, Document, EntityKind, Lead,
    MigrationReport, Persistence, Quotation, SchemaMigrator, SqlValue, CURRENT_SCHEMA_VERSION,
};
use secure_key_vault::{KeyManager, SecureStorage};
use std::path::Path;
use std::sync::Arc;
use sync_orchestrator::{
    StaticConnectivity, SyncDependencies, SyncEvent, SyncMode, SyncOrchestrator, SyncOutcome,
};
use tracing::{info, warn};

/// Run a vault call on the blocking pool; it may sit behind an unlock prompt.
async fn with_vault<T, F>(key_manager: &KeyManager, f: F) -> Result<T>
where
    F: FnOnce(&KeyManager) -> T + Send + 'static,
    T: Send + 'static,
{
    let keys = key_manager.clone();
    tokio::task::spawn_blocking(move || f(&keys))
        .await
        .context("Vault task failed")
}

/// Key, open, migrate: everything that must happen before the store is used.
pub async fn open_store(
    path: &Path,
    key_manager: &KeyManager,
    target: u32,
) -> Result<(DatabaseHandle, MigrationReport)> {
    let key = with_vault(key_manager, KeyManager::get_key)
        .await?
        .context("Could not obtain the database key from the vault")?;

    let db = DatabaseHandle::open(path, &key)
        .await
        .with_context(|| format!("Could not open store at {}", path.display()))?;

    let report = db
        .run_migrations(&SchemaMigrator::default(), target)
        .await
        .context("Schema migration failed")?;

    if !report.applied.is_empty() {
        info!(from = report.from, to = report.to, applied = ?report.applied, "Schema migrated");
    }
    Ok((db, report))
}

pub async fn migrate(config: &AppConfig, key_manager: &KeyManager, target: Option<u32>) -> Result<()> {
    let target = target.unwrap_or(CURRENT_SCHEMA_VERSION);
    let (db, report) = open_store(&config.database_path, key_manager, target).await?;

    if report.applied.is_empty() {
        println!("Schema already at version {}", report.to);
    } else {
        println!(
            "Migrated schema from version {} to {} (steps {:?})",
            report.from, report.to, report.applied
        );
    }
    db.close().await?;
    Ok(())
}

/// Row counts reported by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStatus {
    pub schema_version: u32,
    pub rows: Vec<(EntityKind, u64)>,
    pub pending: Vec<(EntityKind, u64)>,
}

async fn count_rows(
    store: &Persistence,
    kind: EntityKind,
    predicate: Option<String>,
    params: Vec<SqlValue>,
) -> DatabaseResult<u64> {
    match kind {
        EntityKind::Leads => store.count::<Lead>(predicate, params).await,
        EntityKind::Customers => store.count::<Customer>(predicate, params).await,
        EntityKind::Quotations => store.count::<Quotation>(predicate, params).await,
        EntityKind::Commissions => store.count::<Commission>(predicate, params).await,
        EntityKind::Documents => store.count::<Document>(predicate, params).await,
    }
}

pub async fn store_status(store: &Persistence) -> Result<StoreStatus> {
    let schema_version = store.database().schema_version().await?;
    let mut rows = Vec::new();
    let mut pending = Vec::new();

    for kind in EntityKind::ALL {
        rows.push((kind, count_rows(store, kind, None, Vec::new()).await?));
        let unsynced = count_rows(
            store,
            kind,
            Some("sync_status = ?1".to_string()),
            vec![SqlValue::Text("pending".to_string())],
        )
        .await?;
        pending.push((kind, unsynced));
    }

    Ok(StoreStatus {
        schema_version,
        rows,
        pending,
    })
}

pub async fn status(config: &AppConfig, key_manager: &KeyManager) -> Result<()> {
    println!("Store:        {}", config.database_path.display());
    println!("API:          {}", config.api_base_url);

    if !with_vault(key_manager, KeyManager::has_key).await? {
        println!("Database key: not created yet (run `fieldsync migrate`)");
        return Ok(());
    }

    let (db, _) = open_store(&config.database_path, key_manager, CURRENT_SCHEMA_VERSION).await?;
    let status = store_status(&Persistence::new(db.clone())).await?;

    println!("Schema:       v{}", status.schema_version);
    for ((kind, rows), (_, pending)) in status.rows.iter().zip(&status.pending) {
        println!("  {:<12} {:>6} rows  {:>4} pending", kind.to_string(), rows, pending);
    }
    db.close().await?;
    Ok(())
}

fn report_event(event: &SyncEvent) {
    match event {
        SyncEvent::SyncStarted { mode, .. } => println!("Sync started ({mode:?})"),
        SyncEvent::SyncProgress {
            entity,
            current_page,
            total_pages,
            processed_records,
        } => println!("  {entity}: page {current_page}/{total_pages}, {processed_records} records"),
        SyncEvent::SyncFinished {
            duration,
            record_counts,
            pages_processed,
        } => println!(
            "Sync finished in {:.1}s: {} records over {} pages",
            duration.as_secs_f64(),
            record_counts.total,
            pages_processed
        ),
        SyncEvent::SyncFailed { reason, error } => println!("Sync failed ({reason}): {error}"),
    }
}

pub async fn sync(
    config: &AppConfig,
    storage: Arc<dyn SecureStorage>,
    force: bool,
    token: Option<String>,
) -> Result<SyncOutcome> {
    let key_manager = KeyManager::new(storage.clone());
    let (db, _) = open_store(&config.database_path, &key_manager, CURRENT_SCHEMA_VERSION).await?;

    let auth = VaultAuthSession::new(storage);
    if let Some(token) = token {
        let writer = auth.clone();
        tokio::task::spawn_blocking(move || writer.store_token(&token))
            .await
            .context("Vault task failed")?
            .context("Could not store the access token")?;
    }

    let api = FieldApiClient::new(ClientConfig {
        base_url: config.api_base_url.clone(),
        request_timeout: config.request_timeout,
    })?;

    let deps = SyncDependencies::new(
        Arc::new(api),
        Persistence::new(db.clone()),
        Arc::new(StaticConnectivity::new(true)),
        Arc::new(auth),
    );
    let orchestrator = SyncOrchestrator::new(config.sync.clone(), deps);

    let mut events = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            report_event(&event);
        }
    });

    let canceller = orchestrator.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling sync");
            canceller.cancel_sync();
        }
    });

    let mode = if force { SyncMode::Forced } else { SyncMode::Manual };
    let result = orchestrator.perform_sync(mode).await;

    interrupt.abort();
    orchestrator.remove_all_listeners();
    let _ = printer.await;
    db.close().await?;

    let outcome = result?;
    match &outcome {
        SyncOutcome::SkippedOffline => println!("Offline, nothing synced"),
        SyncOutcome::Throttled { retry_after } => {
            println!("Synced recently; retry in {}s or use --force", retry_after.as_secs())
        }
        SyncOutcome::Completed(_) => {}
    }
    Ok(outcome)
}

/// Destroy the database key. The existing store becomes unreadable.
pub async fn reset_key(key_manager: &KeyManager) -> Result<()> {
    with_vault(key_manager, KeyManager::reset_key).await?;
    println!("Database key removed; the next run creates a new key and an empty store");
    Ok(())
}
