mod auth;
mod config;
mod db;
mod error;
mod export;
mod ledger;
mod logging;
mod models;
mod run;
mod store;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args: Vec<String> = std::env::args().collect();

    let config = config::Config::from_env().context("Invalid configuration")?;
    let data_dir = get_data_dir(config.data_dir.clone())?;
    if let Err(e) = logging::init(&data_dir) {
        eprintln!("Warning: logging disabled: {e:#}");
    }
    info!(backend = ?config.backend, "starting finanzas");

    let db = Arc::new(db::Database::open(&data_dir.join("finanzas.db"))?);
    let rt = run::Runtime::new(config, db)?;
    if let Some(auth) = &rt.auth {
        if let Err(e) = auth.restore().await {
            warn!(error = %e, "could not restore session");
        }
    }

    match args.len() {
        1 => run::as_tui(&rt).await,
        _ => run::as_cli(&args, &rt).await,
    }
}

fn get_data_dir(configured: Option<PathBuf>) -> Result<PathBuf> {
    let data_dir = match configured {
        Some(dir) => dir,
        None => directories::ProjectDirs::from("com", "finanzas", "Finanzas")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir)
}
