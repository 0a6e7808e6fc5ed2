use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use askai_core::Config;
use tracing_subscriber::EnvFilter;

/// Send logs to a file; the terminal belongs to the UI.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn configure_logging() -> Result<PathBuf> {
    let log_dir = Config::config_dir()?;
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("askai.log");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))?;

    Ok(log_path)
}
