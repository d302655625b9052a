use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with file-based logging
/// Logs are written to ~/.config/socialdash/logs/socialdash-YYYY-MM-DD-HH-MM-SS.log
pub fn init_logging() -> Result<PathBuf> {
    let logs_dir = dirs::config_dir()
        .ok_or(anyhow::anyhow!("Could not find config directory"))?
        .join("socialdash")
        .join("logs");

    init_logging_in(&logs_dir)
}

/// Same as [`init_logging`], writing into `logs_dir`.
pub fn init_logging_in(logs_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(logs_dir)?;

    // Create timestamped log file name
    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_filename = format!("socialdash-{}.log", timestamp);
    let log_path = logs_dir.join(&log_filename);

    let file_appender = tracing_appender::rolling::never(logs_dir, &log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log file
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    // Default to INFO, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()?;

    // The writer must outlive every span; leak the guard
    std::mem::forget(guard);

    Ok(log_path)
}
