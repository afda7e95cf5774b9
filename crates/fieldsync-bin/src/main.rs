//! FieldSync - offline-first field-sales data store and sync client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fieldsync_bin::config::{AppConfig, DEFAULT_LOG_LEVEL};
use fieldsync_bin::{app, logging::init_logging};
use secure_key_vault::{create_storage, KeyManager, SecureStorage};

/// FieldSync command-line interface.
#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(about = "Encrypted local store and sync for FieldSync field-sales data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FIELDSYNC_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL, global = true)]
    log_level: String,

    /// Path of the local store. Defaults to the platform data directory
    #[arg(long, env = "FIELDSYNC_DATABASE_PATH", global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the local schema
    Migrate {
        /// Schema version to migrate to (defaults to the latest)
        #[arg(long)]
        target: Option<u32>,
    },
    /// Pull all collections from the API
    Sync {
        /// Ignore the minimum interval between syncs
        #[arg(short, long)]
        force: bool,

        /// Access token to store in the vault before syncing
        #[arg(long, env = "FIELDSYNC_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Show store location, schema version and row counts
    Status,
    /// Delete the database key from the vault
    ResetKey {
        /// Confirm that the existing store will become unreadable
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level).context("Failed to initialize logging")?;

    let mut config = AppConfig::from_env()?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    let storage: Arc<dyn SecureStorage> =
        Arc::from(create_storage().context("Secure vault unavailable")?);
    let key_manager = KeyManager::new(storage.clone());

    match cli.command {
        Commands::Migrate { target } => app::migrate(&config, &key_manager, target).await?,
        Commands::Sync { force, token } => {
            app::sync(&config, storage, force, token).await?;
        }
        Commands::Status => app::status(&config, &key_manager).await?,
        Commands::ResetKey { yes } => {
            if !yes {
                bail!("Resetting the key makes the current store unreadable; pass --yes to confirm");
            }
            app::reset_key(&key_manager).await?;
        }
    }

    Ok(())
}
