//! Path utilities for determining data storage locations.
//!
//! The forest database and log file live outside the project, in
//! `~/.goal-forest/`, with one subdirectory per project named after a hash of
//! the project path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// The base directory name for goal-forest data.
const DATA_DIR_NAME: &str = ".goal-forest";

/// The database filename.
pub const DATABASE_FILENAME: &str = "forest.sqlite3";

/// The log filename.
pub const LOG_FILENAME: &str = "goal-forest.log";

/// Get the base data directory.
///
/// Returns `~/.goal-forest/` or `None` if the home directory cannot be determined.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME))
}

/// Get the project-specific data directory.
///
/// Returns `~/.goal-forest/projects/<name>-<hash>/`, where the hash keeps
/// projects with the same directory name apart.
#[must_use]
pub fn project_data_dir(project_dir: &Path) -> Option<PathBuf> {
    let base = data_dir()?;
    Some(base.join("projects").join(project_dir_name(project_dir)))
}

/// Default database path for a project.
#[must_use]
pub fn default_db_path(project_dir: &Path) -> Option<PathBuf> {
    project_data_dir(project_dir).map(|dir| dir.join(DATABASE_FILENAME))
}

/// Default log file path for a project.
#[must_use]
pub fn default_log_path(project_dir: &Path) -> Option<PathBuf> {
    project_data_dir(project_dir).map(|dir| dir.join(LOG_FILENAME))
}

/// Format: `<project-name>-<hash>`, e.g. `my-plans-00a1b2c3d4e5f607`.
fn project_dir_name(project_dir: &Path) -> String {
    let path_to_hash = project_dir.canonicalize().unwrap_or_else(|_| project_dir.to_path_buf());

    let prefix = path_to_hash.file_name().and_then(|n| n.to_str()).unwrap_or("project");
    let prefix: String =
        prefix.chars().map(|c| if c.is_alphanumeric() { c } else { '-' }).collect();
    let prefix = prefix.trim_matches('-');

    format!("{prefix}-{:016x}", hash_path(&path_to_hash))
}

fn hash_path(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}
