//! Logging setup: console plus a timestamped log file.
//!
//! Every run appends nothing and overwrites nothing; it creates a fresh
//! `logs/<YYYYmmddHHMM>_log.txt` so each batch has one attributable log.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes console and file logging, returning the log file path.
pub fn init(verbose: bool, log_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let stamp = chrono::Local::now().format("%Y%m%d%H%M");
    let path = log_dir.join(format!("{stamp}_log.txt"));
    let file = File::create(&path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;

    let level = if verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set up logging: {e}"))?;

    Ok(path)
}
