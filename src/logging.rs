//! File logging for the `goal-forest` binary.
//!
//! Library code only emits `tracing` events. The binary calls [`init`] once at
//! startup, which routes them to `goal-forest.log` in the project data
//! directory. The file is rotated to `goal-forest.log.old` when it grows past
//! [`MAX_LOG_SIZE`].

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Maximum log file size before rotation (1MB).
pub const MAX_LOG_SIZE: u64 = 1_048_576;

/// Open (and rotate if needed) the log file, then install a global subscriber.
///
/// `RUST_LOG` overrides `level` when set. Returns the path being written.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init(log_path: &Path, level: &str) -> Result<PathBuf> {
    let file = open_log_file(log_path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

    tracing::info!(version = crate::VERSION, "goal-forest starting");
    Ok(log_path.to_path_buf())
}

/// Open `path` for appending, moving an oversized file aside first.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    rotate_if_needed(path);
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn rotate_if_needed(path: &Path) {
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    if metadata.len() > MAX_LOG_SIZE {
        let _ = fs::rename(path, path.with_extension("log.old"));
    }
}
