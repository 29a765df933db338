//! Structured logging.
//!
//! JSON lines go to a file under the user's data directory because the TUI owns the
//! terminal. Headless modes add a compact stderr layer for errors. `RUST_LOG`
//! overrides the default `info` filter.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Keep alive for the life of the program; dropping it flushes the file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

pub fn init(log_file: Option<&Path>, stderr: bool) -> Result<LoggingGuard> {
    let path = match log_file {
        Some(p) => p.to_path_buf(),
        None => default_log_path(),
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(file);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true);

    let stderr_layer = stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            // Launch progress already goes to stdout/stderr in headless mode.
            .with_filter(LevelFilter::ERROR)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .context("install tracing subscriber")?;

    tracing::info!(log_path = %path.display(), "logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("script-launcher").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("script-launcher-logs"))
        .join("script-launcher.jsonl")
}
