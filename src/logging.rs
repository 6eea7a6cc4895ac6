use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub(crate) const LOG_FILE: &str = "finanzas.log";

fn filter() -> EnvFilter {
    std::env::var("FINANZAS_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn open_log(data_dir: &Path) -> Result<(File, PathBuf)> {
    let path = data_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    Ok((file, path))
}

/// Send all tracing output to `<data_dir>/finanzas.log`. The terminal stays
/// untouched so the TUI can own it.
pub(crate) fn init(data_dir: &Path) -> Result<PathBuf> {
    let (file, path) = open_log(data_dir)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;
    Ok(path)
}
