//! Handle to the encrypted local store.
//!
//! All SQLite work runs on one dedicated thread owned by `tokio-rusqlite`.
//! Callers send closures through [`DatabaseHandle::call`] and await the
//! result, so the Tokio runtime is never blocked and statements execute in
//! FIFO order. Only SQL and lightweight row mapping belong inside a closure;
//! anything slow starves every other query.
//!
//! ```ignore
//! let db = DatabaseHandle::open(&path, &key).await?;
//! db.run_migrations(&SchemaMigrator::default(), CURRENT_SCHEMA_VERSION).await?;
//! let leads: Vec<Lead> = db.call(|conn| persistence::find_all(conn, None, &[], 50)).await?;
//! ```

use crate::{DatabaseError, DatabaseResult, MigrationReport, SchemaMigrator};
use secure_key_vault::EncryptionKey;
use rusqlite::OptionalExtension;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Convert a tokio_rusqlite::Error to DatabaseError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> DatabaseError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => DatabaseError::Sqlite(e),
        tokio_rusqlite::Error::ConnectionClosed => {
            DatabaseError::Connection("Connection closed".to_string())
        }
        other => DatabaseError::Connection(other.to_string()),
    }
}

const PERFORMANCE_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
    PRAGMA cache_size = -64000;
    PRAGMA temp_store = MEMORY;
    PRAGMA busy_timeout = 5000;
";

/// The single, explicitly injected handle to the local store.
///
/// Cloning is cheap; clones share the executor thread.
#[derive(Clone, Debug)]
pub struct DatabaseHandle {
    conn: Connection,
    path: String,
}

impl DatabaseHandle {
    /// Open (or create) the store at `path`, keyed with `key`.
    ///
    /// The key is applied before any other statement. Fails with
    /// [`DatabaseError::Keying`] when the key does not open an existing file,
    /// or when the linked SQLite cannot encrypt.
    pub async fn open(path: &Path, key: &EncryptionKey) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, "Opening local store");

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let passphrase = key.as_str().to_string();
        let unlocked = conn
            .call(move |conn| {
                // Plain SQLite ignores `PRAGMA key` and would write cleartext.
                let cipher: Option<String> = conn
                    .query_row("PRAGMA cipher_version", [], |row| row.get(0))
                    .optional()?;
                if cipher.is_none() {
                    return Ok(Err("SQLite was built without encryption support".to_string()));
                }

                conn.pragma_update(None, "key", &passphrase)?;
                // First read fails here when the key does not match.
                let probe = conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
                    row.get::<_, i64>(0)
                });
                Ok(probe.map(|_| ()).map_err(|e| e.to_string()))
            })
            .await
            .map_err(from_tokio_rusqlite)?;
        unlocked.map_err(DatabaseError::Keying)?;

        Self::configure(&conn).await?;
        info!(path = %path_str, "Local store ready with WAL mode");

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Unkeyed in-memory store, for tests and ephemeral runs.
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::configure(&conn).await?;
        Ok(Self {
            conn,
            path: ":memory:".to_string(),
        })
    }

    async fn configure(conn: &Connection) -> DatabaseResult<()> {
        conn.call(|conn| {
            conn.execute_batch(PERFORMANCE_PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)
    }

    /// Run `f` on the executor thread with shared access to the connection.
    pub async fn call<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        // Our own result rides inside tokio_rusqlite's Ok; only executor
        // failures come back as its Err.
        match self.conn.call(move |conn| Ok(f(conn))).await {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Like [`call`](Self::call) but with `&mut` access, needed to open
    /// transactions.
    pub async fn call_mut<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.conn.call(move |conn| Ok(f(conn))).await {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that returns a plain `rusqlite::Result`.
    pub async fn call_sqlite<F, T>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Bring the schema to `target` using `migrator`.
    pub async fn run_migrations(
        &self,
        migrator: &SchemaMigrator,
        target: u32,
    ) -> DatabaseResult<MigrationReport> {
        let migrator = migrator.clone();
        self.call_mut(move |conn| Ok(migrator.run(conn, target)?))
            .await
    }

    /// Schema version currently recorded in the store.
    pub async fn schema_version(&self) -> DatabaseResult<u32> {
        self.call_sqlite(|conn| crate::migrations::current_version(conn))
            .await
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.call_sqlite(|conn| conn.execute_batch("SELECT 1")).await?;
        debug!("Database health check passed");
        Ok(())
    }

    /// Wait for queued work to finish, then stop the executor thread.
    pub async fn close(self) -> DatabaseResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to close database: {:?}", e)))?;
        info!(path = %self.path, "Database closed");
        Ok(())
    }
}
