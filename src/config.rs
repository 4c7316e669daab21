//! Configuration management for goal-forest.
//!
//! This module handles the `.goal-forest/config.yaml` file which stores
//! project-specific settings: where the forest database lives and how much
//! to log.

use crate::error::{Error, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file path relative to project root.
pub const CONFIG_FILE_PATH: &str = ".goal-forest/config.yaml";

/// Log level used when the config does not name one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Project configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ForestConfig {
    /// SQLite database file. Relative paths are resolved against the project
    /// directory. None means the per-project default under `~/.goal-forest/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Log filter directive (e.g. "debug", "goal_forest=trace").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl ForestConfig {
    /// Load config from a specific base directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = Self::config_path(base_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Save config to a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(base_dir);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a base directory.
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }

    /// The database file this config points at.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the home directory
    /// cannot be determined.
    pub fn resolved_database_path(&self, base_dir: &Path) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(base_dir.join(path)),
            None => paths::default_db_path(base_dir).ok_or_else(no_home),
        }
    }

    /// The log file for this project.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn resolved_log_path(&self, base_dir: &Path) -> Result<PathBuf> {
        paths::default_log_path(base_dir).ok_or_else(no_home)
    }

    /// The configured log level, or [`DEFAULT_LOG_LEVEL`].
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

fn no_home() -> Error {
    Error::InvalidInput("cannot determine home directory; set database_path in config".to_string())
}

/// Ensure config exists in a specific directory, creating it with defaults if not.
///
/// Returns the config (either loaded or newly created).
///
/// # Errors
///
/// Returns an error if config cannot be loaded or saved.
pub fn ensure_config(base_dir: &Path) -> Result<ForestConfig> {
    if let Some(config) = ForestConfig::load_from(base_dir)? {
        return Ok(config);
    }

    let config = ForestConfig::default();
    config.save_to(base_dir)?;
    tracing::info!(path = %ForestConfig::config_path(base_dir).display(), "created config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_forest_config_default() {
        let config = ForestConfig::default();
        assert!(config.database_path.is_none());
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_forest_config_load_not_found() {
        let dir = TempDir::new().unwrap();
        let result = ForestConfig::load_from(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_forest_config_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config = ForestConfig {
            database_path: Some(PathBuf::from("data/forest.db")),
            log_level: Some("debug".to_string()),
        };
        config.save_to(dir.path()).unwrap();

        let loaded = ForestConfig::load_from(dir.path()).unwrap().unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_forest_config_yaml_format() {
        let dir = TempDir::new().unwrap();
        let config = ForestConfig { database_path: None, log_level: Some("warn".to_string()) };
        config.save_to(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(CONFIG_FILE_PATH)).unwrap();
        assert!(content.contains("log_level: warn"));
        assert!(!content.contains("database_path"));
    }

    #[test]
    fn test_forest_config_rejects_malformed_yaml() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".goal-forest")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_PATH), "log_level: [unterminated").unwrap();
        assert!(matches!(ForestConfig::load_from(dir.path()), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_resolved_database_path() {
        let base = Path::new("/projects/plans");
        let relative = ForestConfig { database_path: Some("db/f.sqlite3".into()), log_level: None };
        assert_eq!(relative.resolved_database_path(base).unwrap(), base.join("db/f.sqlite3"));

        let absolute = ForestConfig { database_path: Some("/tmp/f.sqlite3".into()), log_level: None };
        assert_eq!(absolute.resolved_database_path(base).unwrap(), PathBuf::from("/tmp/f.sqlite3"));

        if dirs::home_dir().is_some() {
            let default = ForestConfig::default().resolved_database_path(base).unwrap();
            assert!(default.ends_with(paths::DATABASE_FILENAME));
        }
    }

    #[test]
    fn test_ensure_config_creates_new() {
        let dir = TempDir::new().unwrap();
        let config = ensure_config(dir.path()).unwrap();
        assert_eq!(config, ForestConfig::default());
        assert!(dir.path().join(CONFIG_FILE_PATH).exists());
    }

    #[test]
    fn test_ensure_config_loads_existing() {
        let dir = TempDir::new().unwrap();
        let existing = ForestConfig { database_path: None, log_level: Some("trace".to_string()) };
        existing.save_to(dir.path()).unwrap();

        let config = ensure_config(dir.path()).unwrap();
        assert_eq!(config.log_level(), "trace");
    }

    #[test]
    fn test_config_path() {
        let path = ForestConfig::config_path(Path::new("/foo/bar"));
        assert_eq!(path, PathBuf::from("/foo/bar/.goal-forest/config.yaml"));
    }
}
