use crate::config::LoggingConfig;
use crate::error::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber from the `logging` config section.
///
/// `level` is an EnvFilter directive (e.g. "info", "vegsat=debug"), `format`
/// is "compact" or "pretty", and `file_path` redirects output to an append
/// log file instead of stderr. Safe to call more than once; later calls are
/// no-ops.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.file_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false);
            if config.format == "pretty" {
                let _ = builder.pretty().try_init();
            } else {
                let _ = builder.compact().try_init();
            }
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            if config.format == "pretty" {
                let _ = builder.pretty().try_init();
            } else {
                let _ = builder.compact().try_init();
            }
        }
    }
    Ok(())
}
