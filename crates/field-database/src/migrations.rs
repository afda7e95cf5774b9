//! Versioned schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. Each step runs in its own
//! transaction: `apply`, then `validate`, then the version bump. A step whose
//! validation fails keeps its structural changes but leaves the version where
//! it was, so the next run retries it. Every `apply` must tolerate structures
//! that already exist.

use crate::{MigrationError, MigrationResult};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

/// Schema version this build expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 6;

/// One schema change.
#[derive(Clone, Copy)]
pub struct MigrationStep {
    pub version: u32,
    pub description: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
    pub validate: Option<fn(&Connection) -> rusqlite::Result<bool>>,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish()
    }
}

/// Outcome of [`SchemaMigrator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    pub applied: Vec<u32>,
}

/// Ordered registry of migration steps.
#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    steps: Vec<MigrationStep>,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self {
            steps: builtin_steps(),
        }
    }
}

impl SchemaMigrator {
    /// Build a migrator from `steps`, which must have strictly ascending
    /// versions starting above zero.
    pub fn new(steps: Vec<MigrationStep>) -> MigrationResult<Self> {
        let mut previous = 0;
        for step in &steps {
            if step.version <= previous {
                return Err(MigrationError::InvalidRegistry(format!(
                    "step v{} ({}) does not follow v{}",
                    step.version, step.description, previous
                )));
            }
            previous = step.version;
        }
        Ok(Self { steps })
    }

    /// Newest version any registered step produces.
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map(|s| s.version).unwrap_or(0)
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Bring the store up to `target`.
    pub fn run(&self, conn: &mut Connection, target: u32) -> MigrationResult<MigrationReport> {
        let latest = self.latest_version();
        if target > latest {
            return Err(MigrationError::UnknownTarget { target, latest });
        }

        let from = current_version(conn)?;
        if target < from {
            warn!(
                current_version = from,
                target_version = target,
                "Store is newer than requested schema, leaving it untouched"
            );
            return Ok(MigrationReport {
                from,
                to: from,
                applied: Vec::new(),
            });
        }

        info!(current_version = from, target_version = target, "Running migrations");

        let mut applied = Vec::new();
        for step in self
            .steps
            .iter()
            .filter(|s| s.version > from && s.version <= target)
        {
            self.run_step(conn, step)?;
            applied.push(step.version);
        }

        let to = current_version(conn)?;
        info!(from, to, applied = applied.len(), "Migrations complete");
        Ok(MigrationReport { from, to, applied })
    }

    fn run_step(&self, conn: &mut Connection, step: &MigrationStep) -> MigrationResult<()> {
        let step_err = |source| MigrationError::Step {
            version: step.version,
            description: step.description.to_string(),
            source,
        };

        info!(version = step.version, description = step.description, "Applying migration");
        let tx = conn.transaction()?;

        // Dropping `tx` on an early return rolls the step back.
        (step.apply)(&tx).map_err(step_err)?;

        if let Some(validate) = step.validate {
            let valid = validate(&tx).map_err(step_err)?;
            if !valid {
                tx.commit()?;
                warn!(version = step.version, description = step.description, "Migration failed validation");
                return Err(MigrationError::Validation {
                    version: step.version,
                    description: step.description.to_string(),
                });
            }
        }

        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
        debug!(version = step.version, "Migration applied");
        Ok(())
    }
}

/// Schema version recorded in the store.
pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
        params![table, column],
        |row| row.get(0),
    )
}

pub fn index_exists(conn: &Connection, index: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        params![index],
        |row| row.get(0),
    )
}

/// Add `column` to `table` unless it is already there. Returns whether the
/// column was added.
pub fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<bool> {
    if column_exists(conn, table, column)? {
        debug!(table, column, "Column already present");
        return Ok(false);
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))?;
    Ok(true)
}

fn builtin_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            version: 1,
            description: "base tables",
            apply: migrate_v1_base_tables,
            validate: Some(validate_v1),
        },
        MigrationStep {
            version: 2,
            description: "documents table",
            apply: migrate_v2_documents,
            validate: Some(|conn| table_exists(conn, "documents")),
        },
        MigrationStep {
            version: 3,
            description: "lead page numbers",
            apply: migrate_v3_lead_page_number,
            validate: Some(|conn| {
                Ok(column_exists(conn, "leads", "page_number")?
                    && index_exists(conn, "idx_leads_page_number")?)
            }),
        },
        MigrationStep {
            version: 4,
            description: "document customer link",
            apply: migrate_v4_document_customer,
            validate: Some(|conn| {
                Ok(column_exists(conn, "documents", "customer_id")?
                    && index_exists(conn, "idx_documents_customer_id")?)
            }),
        },
        MigrationStep {
            version: 5,
            description: "customer kyc status",
            apply: migrate_v5_customer_kyc,
            validate: Some(|conn| column_exists(conn, "customers", "kyc_status")),
        },
        MigrationStep {
            version: 6,
            description: "commissions table",
            apply: migrate_v6_commissions,
            validate: Some(validate_v6),
        },
    ]
}

/// V1: leads, customers and quotations.
fn migrate_v1_base_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            company TEXT,
            status TEXT NOT NULL DEFAULT 'new',
            source TEXT,
            assigned_to TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            local_changes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_leads_sync_status ON leads(sync_status);

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            address TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            local_changes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_customers_sync_status ON customers(sync_status);

        CREATE TABLE IF NOT EXISTS quotations (
            id TEXT PRIMARY KEY,
            lead_id TEXT,
            customer_id TEXT,
            title TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'INR',
            status TEXT NOT NULL DEFAULT 'draft',
            valid_until TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            local_changes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quotations_sync_status ON quotations(sync_status);
        CREATE INDEX IF NOT EXISTS idx_quotations_lead_id ON quotations(lead_id);
        ",
    )
}

fn validate_v1(conn: &Connection) -> rusqlite::Result<bool> {
    for table in ["leads", "customers", "quotations"] {
        if !table_exists(conn, table)? || !column_exists(conn, table, "sync_status")? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// V2: documents attached to leads.
fn migrate_v2_documents(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            lead_id TEXT,
            name TEXT NOT NULL,
            mime_type TEXT,
            url TEXT,
            size_bytes INTEGER,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            local_changes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_sync_status ON documents(sync_status);
        CREATE INDEX IF NOT EXISTS idx_documents_lead_id ON documents(lead_id);
        ",
    )
}

/// V3: remember which server page a lead arrived on.
fn migrate_v3_lead_page_number(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "leads", "page_number", "INTEGER")?;
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_leads_page_number ON leads(page_number);")
}

/// V4: documents can belong to a customer as well as a lead.
fn migrate_v4_document_customer(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "documents", "customer_id", "TEXT")?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_documents_customer_id ON documents(customer_id);",
    )
}

/// V5: KYC state on customers.
fn migrate_v5_customer_kyc(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "customers", "kyc_status", "TEXT NOT NULL DEFAULT 'pending'")?;
    Ok(())
}

const COMMISSION_COLUMNS: [&str; 12] = [
    "id",
    "lead_id",
    "quotation_id",
    "agent_id",
    "amount",
    "currency",
    "status",
    "payout_date",
    "sync_status",
    "local_changes",
    "created_at",
    "updated_at",
];

/// V6: agent commissions.
fn migrate_v6_commissions(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS commissions (
            id TEXT PRIMARY KEY,
            lead_id TEXT,
            quotation_id TEXT,
            agent_id TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'INR',
            status TEXT NOT NULL DEFAULT 'pending',
            payout_date TEXT,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            local_changes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_commissions_sync_status ON commissions(sync_status);
        CREATE INDEX IF NOT EXISTS idx_commissions_agent_id ON commissions(agent_id);
        ",
    )
}

fn validate_v6(conn: &Connection) -> rusqlite::Result<bool> {
    for column in COMMISSION_COLUMNS {
        if !column_exists(conn, "commissions", column)? {
            return Ok(false);
        }
    }
    Ok(true)
}
