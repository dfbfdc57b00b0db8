//! Tracing setup for handler processes
//!
//! Logs go to a file in the handler environment's log folder. When the file
//! cannot be opened, output falls back to stderr so nothing is lost.

use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Placeholder in a log file name format replaced by the current unix time in seconds
pub const LOG_FILE_TIMESTAMP_PLACEHOLDER: &str = "%v";

pub const DEFAULT_LOG_FILE_NAME_FORMAT: &str = "log_%v";

/// Expand a log file name format
pub fn log_file_name(format: &str) -> String {
    format.replace(
        LOG_FILE_TIMESTAMP_PLACEHOLDER,
        &Utc::now().timestamp().to_string(),
    )
}

fn open_log_file(log_folder: &Path, file_name_format: &str) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(log_folder)?;
    let path = log_folder.join(log_file_name(file_name_format));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Install the global subscriber.
///
/// Returns the log file path when file logging is active. Calling this more
/// than once keeps the first subscriber.
pub fn init_tracing(log_folder: &Path, file_name_format: &str, filter: &str) -> Option<PathBuf> {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match open_log_file(log_folder, file_name_format) {
        Ok((file, path)) => {
            let installed = tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(filter)
                .try_init()
                .is_ok();
            installed.then_some(path)
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .with(filter)
                .try_init();
            tracing::warn!(
                "Could not open log file in {}: {}. Logging to stderr",
                log_folder.display(),
                e
            );
            None
        }
    }
}

/// Stderr-only subscriber, used before the handler environment is known
pub fn init_stderr_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
