//! Runtime configuration for the command-line client.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use sync_orchestrator::SyncConfig;
use tracing::warn;
use url::Url;

/// Default API endpoint (can be overridden at compile time via FIELDSYNC_API_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("FIELDSYNC_API_URL") {
    Some(url) => url,
    None => "https://api.fieldsync.app/v1",
};

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DATABASE_FILE_NAME: &str = "fieldsync.db";

/// Everything the binary needs to open the store and reach the API.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub database_path: PathBuf,
    pub request_timeout: Duration,
    pub sync: SyncConfig,
}

/// `<data_local_dir>/fieldsync/fieldsync.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("fieldsync").join(DATABASE_FILE_NAME))
}

impl AppConfig {
    /// Defaults overridden from `FIELDSYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url =
            lookup("FIELDSYNC_API_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let database_path = match lookup("FIELDSYNC_DATABASE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_database_path()
                .ok_or_else(|| anyhow!("Could not determine a data directory for the store"))?,
        };

        let request_timeout = match lookup("FIELDSYNC_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!(value = %raw, "Ignoring unparsable request timeout");
                    field_api_client::DEFAULT_REQUEST_TIMEOUT
                }
            },
            None => field_api_client::DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            api_base_url,
            database_path,
            request_timeout,
            sync: SyncConfig::from_vars(&lookup),
        })
    }

    /// The API base as a parsed URL.
    pub fn api_url(&self) -> Result<Url> {
        Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_vars(vars(&[("FIELDSYNC_DATABASE_PATH", "/tmp/f.db")])).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.database_path, PathBuf::from("/tmp/f.db"));
        assert_eq!(config.request_timeout, field_api_client::DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_vars(vars(&[
            ("FIELDSYNC_API_URL", "http://localhost:8080/api"),
            ("FIELDSYNC_DATABASE_PATH", "/data/field.db"),
            ("FIELDSYNC_REQUEST_TIMEOUT_SECS", "5"),
            ("FIELDSYNC_PAGE_SIZE", "50"),
        ]))
        .unwrap();

        assert_eq!(config.api_url().unwrap().as_str(), "http://localhost:8080/api");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.sync.page_size, 50);
    }

    #[test]
    fn test_bad_timeout_falls_back() {
        let config = AppConfig::from_vars(vars(&[
            ("FIELDSYNC_DATABASE_PATH", "/tmp/f.db"),
            ("FIELDSYNC_REQUEST_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, field_api_client::DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_invalid_url_is_reported() {
        let config = AppConfig::from_vars(vars(&[
            ("FIELDSYNC_DATABASE_PATH", "/tmp/f.db"),
            ("FIELDSYNC_API_URL", "not a url"),
        ]))
        .unwrap();
        assert!(config.api_url().is_err());
    }
}
