//! Domain record types and their row mappings.

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local replication state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    #[default]
    Pending,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    /// Lenient parse of a stored status; anything unknown is `Pending`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "synced" => Self::Synced,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Bookkeeping columns shared by every entity table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Assigned on first write when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Serialized JSON diff of unsynced local edits.
    #[serde(default)]
    pub local_changes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RecordMeta {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            sync_status: SyncStatus::parse(&row.get::<_, String>("sync_status")?),
            local_changes: row.get("local_changes")?,
            created_at: Some(get_datetime(row, "created_at")?),
            updated_at: Some(get_datetime(row, "updated_at")?),
        })
    }
}

/// RFC 3339 text column. A value that does not parse is a conversion error.
fn get_datetime(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            let index = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        })
}

/// A record stored in one entity table.
///
/// `COLUMNS` lists the domain columns only; the bookkeeping columns from
/// [`RecordMeta`] are handled by the persistence layer. `bind_values` must
/// yield one value per entry in `COLUMNS`, in the same order.
pub trait EntityRecord: Sized + Send + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
    fn bind_values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// The five synchronized collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Leads,
    Customers,
    Quotations,
    Commissions,
    Documents,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Leads,
        Self::Customers,
        Self::Quotations,
        Self::Commissions,
        Self::Documents,
    ];

    /// Table name, which doubles as the remote collection path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leads => Lead::TABLE,
            Self::Customers => Customer::TABLE,
            Self::Quotations => Quotation::TABLE,
            Self::Commissions => Commission::TABLE,
            Self::Documents => Document::TABLE,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown entity '{s}'"))
    }
}

fn default_lead_status() -> String {
    "new".to_string()
}

fn default_kyc_status() -> String {
    "pending".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_quotation_status() -> String {
    "draft".to_string()
}

fn default_commission_status() -> String {
    "pending".to_string()
}

/// Sales lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default = "default_lead_status")]
    pub status: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Server page the lead was last delivered on.
    #[serde(default)]
    pub page_number: Option<i64>,
}

impl Lead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            name: name.into(),
            phone: None,
            email: None,
            company: None,
            status: default_lead_status(),
            source: None,
            assigned_to: None,
            page_number: None,
        }
    }
}

impl EntityRecord for Lead {
    const TABLE: &'static str = "leads";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "phone",
        "email",
        "company",
        "status",
        "source",
        "assigned_to",
        "page_number",
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.phone.clone().into(),
            self.email.clone().into(),
            self.company.clone().into(),
            self.status.clone().into(),
            self.source.clone().into(),
            self.assigned_to.clone().into(),
            self.page_number.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: RecordMeta::from_row(row)?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            company: row.get("company")?,
            status: row.get("status")?,
            source: row.get("source")?,
            assigned_to: row.get("assigned_to")?,
            page_number: row.get("page_number")?,
        })
    }
}

/// Converted customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_kyc_status")]
    pub kyc_status: String,
}

impl EntityRecord for Customer {
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static [&'static str] = &["name", "phone", "email", "address", "kyc_status"];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.phone.clone().into(),
            self.email.clone().into(),
            self.address.clone().into(),
            self.kyc_status.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: RecordMeta::from_row(row)?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            address: row.get("address")?,
            kyc_status: row.get("kyc_status")?,
        })
    }
}

/// Price quotation issued against a lead or customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub title: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_quotation_status")]
    pub status: String,
    #[serde(default)]
    pub valid_until: Option<String>,
}

impl EntityRecord for Quotation {
    const TABLE: &'static str = "quotations";
    const COLUMNS: &'static [&'static str] = &[
        "lead_id",
        "customer_id",
        "title",
        "amount",
        "currency",
        "status",
        "valid_until",
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![
            self.lead_id.clone().into(),
            self.customer_id.clone().into(),
            self.title.clone().into(),
            self.amount.into(),
            self.currency.clone().into(),
            self.status.clone().into(),
            self.valid_until.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: RecordMeta::from_row(row)?,
            lead_id: row.get("lead_id")?,
            customer_id: row.get("customer_id")?,
            title: row.get("title")?,
            amount: row.get("amount")?,
            currency: row.get("currency")?,
            status: row.get("status")?,
            valid_until: row.get("valid_until")?,
        })
    }
}

/// Commission owed to a field agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub quotation_id: Option<String>,
    pub agent_id: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_commission_status")]
    pub status: String,
    #[serde(default)]
    pub payout_date: Option<String>,
}

impl EntityRecord for Commission {
    const TABLE: &'static str = "commissions";
    const COLUMNS: &'static [&'static str] = &[
        "lead_id",
        "quotation_id",
        "agent_id",
        "amount",
        "currency",
        "status",
        "payout_date",
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![
            self.lead_id.clone().into(),
            self.quotation_id.clone().into(),
            self.agent_id.clone().into(),
            self.amount.into(),
            self.currency.clone().into(),
            self.status.clone().into(),
            self.payout_date.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: RecordMeta::from_row(row)?,
            lead_id: row.get("lead_id")?,
            quotation_id: row.get("quotation_id")?,
            agent_id: row.get("agent_id")?,
            amount: row.get("amount")?,
            currency: row.get("currency")?,
            status: row.get("status")?,
            payout_date: row.get("payout_date")?,
        })
    }
}

/// File attached to a lead or customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
}

impl EntityRecord for Document {
    const TABLE: &'static str = "documents";
    const COLUMNS: &'static [&'static str] =
        &["customer_id", "lead_id", "name", "mime_type", "url", "size_bytes"];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn bind_values(&self) -> Vec<Value> {
        vec![
            self.customer_id.clone().into(),
            self.lead_id.clone().into(),
            self.name.clone().into(),
            self.mime_type.clone().into(),
            self.url.clone().into(),
            self.size_bytes.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            meta: RecordMeta::from_row(row)?,
            customer_id: row.get("customer_id")?,
            lead_id: row.get("lead_id")?,
            name: row.get("name")?,
            mime_type: row.get("mime_type")?,
            url: row.get("url")?,
            size_bytes: row.get("size_bytes")?,
        })
    }
}
