//! Transactional reads and writes over the entity tables.
//!
//! Writes go through [`upsert_many`], which commits a whole batch or nothing.
//! Reads are parameterized and `find_all` always carries a row limit.

use crate::{DatabaseError, DatabaseHandle, DatabaseResult, EntityRecord, SyncStatus};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

/// Upper bound applied to every `find_all` limit.
pub const MAX_QUERY_LIMIT: u32 = 1000;

/// Where a batch of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    /// Edited on this device; rows keep their status (default `pending`).
    Local,
    /// Delivered by the server; rows become `synced` and lose local diffs.
    Remote,
}

const META_COLUMNS: [&str; 4] = ["sync_status", "local_changes", "created_at", "updated_at"];

fn select_columns<R: EntityRecord>() -> String {
    std::iter::once("id")
        .chain(R::COLUMNS.iter().copied())
        .chain(META_COLUMNS)
        .collect::<Vec<_>>()
        .join(", ")
}

fn upsert_sql<R: EntityRecord>() -> String {
    let columns: Vec<&str> = std::iter::once("id")
        .chain(R::COLUMNS.iter().copied())
        .chain(META_COLUMNS)
        .collect();
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = R::COLUMNS
        .iter()
        .chain(["sync_status", "local_changes", "updated_at"].iter())
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders})
         ON CONFLICT(id) DO UPDATE SET {updates}",
        table = R::TABLE,
        columns = columns.join(", "),
    )
}

/// Insert or update `records` in a single transaction. Returns the ids
/// written, in input order.
pub fn upsert_many<R: EntityRecord>(
    conn: &mut Connection,
    records: &[R],
    origin: RecordOrigin,
) -> DatabaseResult<Vec<String>> {
    let now = Utc::now();
    let sql = upsert_sql::<R>();
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(records.len());

    {
        let mut stmt = tx.prepare_cached(&sql)?;
        for record in records {
            let meta = record.meta();
            let id = meta
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            let (status, local_changes, updated_at) = match origin {
                RecordOrigin::Remote => (
                    SyncStatus::Synced,
                    None,
                    meta.updated_at.unwrap_or(now),
                ),
                RecordOrigin::Local => (meta.sync_status, meta.local_changes.clone(), now),
            };

            let mut values: Vec<Value> = Vec::with_capacity(R::COLUMNS.len() + 5);
            values.push(id.clone().into());
            values.extend(record.bind_values());
            values.push(status.as_str().to_string().into());
            values.push(local_changes.into());
            values.push(meta.created_at.unwrap_or(now).to_rfc3339().into());
            values.push(updated_at.to_rfc3339().into());

            stmt.execute(params_from_iter(values))?;
            ids.push(id);
        }
    }

    tx.commit()?;
    debug!(table = R::TABLE, count = ids.len(), ?origin, "Upserted batch");
    Ok(ids)
}

/// Rows matching `predicate` (a SQL boolean expression using `?`
/// placeholders bound from `params`), oldest first, at most `limit`.
pub fn find_all<R: EntityRecord>(
    conn: &Connection,
    predicate: Option<&str>,
    params: &[Value],
    limit: u32,
) -> DatabaseResult<Vec<R>> {
    let limit = limit.clamp(1, MAX_QUERY_LIMIT);
    let sql = format!(
        "SELECT {columns} FROM {table} WHERE {predicate} ORDER BY created_at, id LIMIT {limit}",
        columns = select_columns::<R>(),
        table = R::TABLE,
        predicate = predicate.unwrap_or("1 = 1"),
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), R::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_by_id<R: EntityRecord>(conn: &Connection, id: &str) -> DatabaseResult<Option<R>> {
    let sql = format!(
        "SELECT {columns} FROM {table} WHERE id = ?1",
        columns = select_columns::<R>(),
        table = R::TABLE,
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row(params![id], R::from_row).optional()?)
}

pub fn count<R: EntityRecord>(
    conn: &Connection,
    predicate: Option<&str>,
    params: &[Value],
) -> DatabaseResult<u64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {table} WHERE {predicate}",
        table = R::TABLE,
        predicate = predicate.unwrap_or("1 = 1"),
    );
    let n: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(n as u64)
}

/// Merge `diff` into the row's pending local changes and mark it `pending`.
pub fn record_local_change<R: EntityRecord>(
    conn: &mut Connection,
    id: &str,
    diff: &JsonValue,
) -> DatabaseResult<()> {
    let tx = conn.transaction()?;

    let existing: Option<Option<String>> = tx
        .query_row(
            &format!("SELECT local_changes FROM {} WHERE id = ?1", R::TABLE),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(existing) = existing else {
        return Err(DatabaseError::NotFound(format!("{} {}", R::TABLE, id)));
    };

    let merged = match (existing.as_deref().map(serde_json::from_str::<JsonValue>), diff) {
        (Some(Ok(JsonValue::Object(mut current))), JsonValue::Object(update)) => {
            current.extend(update.clone());
            JsonValue::Object(current)
        }
        _ => diff.clone(),
    };

    tx.execute(
        &format!(
            "UPDATE {} SET sync_status = ?1, local_changes = ?2, updated_at = ?3 WHERE id = ?4",
            R::TABLE
        ),
        params![
            SyncStatus::Pending.as_str(),
            serde_json::to_string(&merged)?,
            Utc::now().to_rfc3339(),
            id
        ],
    )?;
    tx.commit()?;
    Ok(())
}

/// Rows with unsynced local state.
pub fn find_pending<R: EntityRecord>(conn: &Connection, limit: u32) -> DatabaseResult<Vec<R>> {
    find_all(
        conn,
        Some("sync_status <> ?"),
        &[Value::from(SyncStatus::Synced.as_str().to_string())],
        limit,
    )
}

/// Async access to the entity tables through a [`DatabaseHandle`].
#[derive(Clone)]
pub struct Persistence {
    db: DatabaseHandle,
}

impl Persistence {
    pub fn new(db: DatabaseHandle) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.db
    }

    pub async fn upsert_many<R: EntityRecord>(
        &self,
        records: Vec<R>,
        origin: RecordOrigin,
    ) -> DatabaseResult<Vec<String>> {
        self.db
            .call_mut(move |conn| upsert_many(conn, &records, origin))
            .await
    }

    pub async fn find_all<R: EntityRecord>(
        &self,
        predicate: Option<String>,
        params: Vec<Value>,
        limit: u32,
    ) -> DatabaseResult<Vec<R>> {
        self.db
            .call(move |conn| find_all(conn, predicate.as_deref(), &params, limit))
            .await
    }

    pub async fn find_by_id<R: EntityRecord>(&self, id: &str) -> DatabaseResult<Option<R>> {
        let id = id.to_string();
        self.db.call(move |conn| find_by_id(conn, &id)).await
    }

    pub async fn count<R: EntityRecord>(
        &self,
        predicate: Option<String>,
        params: Vec<Value>,
    ) -> DatabaseResult<u64> {
        self.db
            .call(move |conn| count::<R>(conn, predicate.as_deref(), &params))
            .await
    }

    pub async fn record_local_change<R: EntityRecord>(
        &self,
        id: &str,
        diff: JsonValue,
    ) -> DatabaseResult<()> {
        let id = id.to_string();
        self.db
            .call_mut(move |conn| record_local_change::<R>(conn, &id, &diff))
            .await
    }

    pub async fn find_pending<R: EntityRecord>(&self, limit: u32) -> DatabaseResult<Vec<R>> {
        self.db.call(move |conn| find_pending(conn, limit)).await
    }
}
