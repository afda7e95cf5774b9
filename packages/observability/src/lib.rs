//! # Observability
//!
//! Logging setup shared by the FieldSync binaries.
//!
//! Library crates only use `tracing` macros with structured fields. Binaries
//! call [`init_with_config`] once at startup to decide where those events go:
//!
//! - a JSONL file (one object per line, see [`JsonLayer`]) for later analysis
//!   with `jq` or `lnav`
//! - stderr, in compact human-readable form
//!
//! `RUST_LOG` overrides the configured level for both.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() -> std::io::Result<()> {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "fieldsync".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     })?;
//!
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

mod file_writer;
mod json_layer;

pub use file_writer::LogFileWriter;
pub use json_layer::JsonLayer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Included in every JSONL line.
    pub service_name: String,

    /// Level filter used when `RUST_LOG` is unset (e.g. "debug", "info").
    pub default_level: String,

    /// JSONL destination. `None` uses [`default_log_path`]; if that cannot
    /// be resolved only stderr is used.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "fieldsync".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// `<data_local_dir>/fieldsync/logs/<service>.jsonl`.
pub fn default_log_path(service_name: &str) -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| {
        dir.join("fieldsync")
            .join("logs")
            .join(format!("{service_name}.jsonl"))
    })
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber.
///
/// Fails if the log file cannot be opened or a global subscriber is
/// already set.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let log_path = config
        .log_path
        .clone()
        .or_else(|| default_log_path(&config.service_name));

    let json_layer = match &log_path {
        Some(path) => {
            let writer = LogFileWriter::open(path)?;
            Some(
                JsonLayer::new(config.service_name.clone(), writer)
                    .with_filter(env_filter(&config.default_level)),
            )
        }
        None => None,
    };

    let stderr_layer = if config.also_stderr || log_path.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(&config.default_level)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::debug!(
        service = %config.service_name,
        log_path = ?log_path,
        "observability initialized"
    );
    Ok(())
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};
