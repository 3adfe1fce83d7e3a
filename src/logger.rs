//! File logging; the terminal belongs to the UI.

use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

const APP_NAME: &str = "prbar";
const LOG_FILE: &str = "prbar.log";

/// Returns the directory holding the log file, creating it if needed.
fn log_dir() -> Result<PathBuf> {
    let dir = dirs::cache_dir()
        .context("could not determine cache directory")?
        .join(APP_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
    Ok(dir)
}

fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Starts logging to the cache directory and returns the log file path.
pub fn init() -> Result<PathBuf> {
    let path = log_dir()?.join(LOG_FILE);

    let level = level_from_env(std::env::var("RUST_LOG").ok().as_deref());
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_time_offset_to_local()
        .unwrap_or_else(|c| c)
        .build();

    let file = File::create(&path)
        .with_context(|| format!("failed to create log file: {}", path.display()))?;
    WriteLogger::init(level, config, file).context("failed to initialize logger")?;

    Ok(path)
}
