//! Structured logging setup with tracing

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where and how much to log
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub directory: PathBuf,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Human-readable output on stderr in addition to the JSON file
    pub console: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            directory: super::log_dir(),
            default_filter: "info".to_string(),
            console: cfg!(debug_assertions),
        }
    }
}

/// Initialize the logging system
pub fn init_logging(options: &LogOptions) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&options.directory)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &options.directory, "files.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    let console = options
        .console
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(fmt::layer().json().with_writer(non_blocking))
        .try_init()?;

    tracing::info!(directory = ?options.directory, "Logging initialized");
    Ok(guard)
}

/// Clean up log files older than specified days
pub fn cleanup_old_logs(log_dir: &Path, days: u32) -> anyhow::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let threshold = SystemTime::now() - Duration::from_secs(days as u64 * 24 * 60 * 60);
    let mut deleted = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        // Rolled files are named files.log.YYYY-MM-DD
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with("files.log") || n.ends_with(".log"));
        if !is_log {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => continue,
        };
        if modified < threshold && std::fs::remove_file(&path).is_ok() {
            deleted += 1;
            tracing::debug!("Deleted old log: {:?}", path);
        }
    }

    tracing::info!("Cleaned up {} old log files", deleted);
    Ok(deleted)
}
