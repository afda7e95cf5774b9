//! Logging setup for the command-line client.

/// Initialize logging with the given default level.
///
/// JSONL goes to the shared log directory; compact lines go to stderr.
/// `RUST_LOG` overrides `level`.
///
/// ```rust,ignore
/// init_logging("info")?;
/// tracing::info!("fieldsync started");
/// ```
pub fn init_logging(level: &str) -> std::io::Result<()> {
    observability::init_with_config(observability::LogConfig {
        service_name: "fieldsync-cli".into(),
        default_level: level.into(),
        also_stderr: true,
        ..Default::default()
    })
}
