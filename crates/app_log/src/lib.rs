//! Files Logging & Observability Module
//!
//! Provides structured logging, panic handling and crash reports.

mod panic_hook;
mod logging;

pub use panic_hook::{crash_report_path, init_panic_hook};
pub use logging::{cleanup_old_logs, init_logging, LogOptions};
pub use tracing_appender::non_blocking::WorkerGuard;

use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the application log directory
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "Files", "Files")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// Initialize all observability features
///
/// The returned guard flushes the log file when dropped; keep it alive in `main`.
pub fn init(options: &LogOptions) -> anyhow::Result<WorkerGuard> {
    let guard = init_logging(options)?;
    init_panic_hook();
    Ok(guard)
}
