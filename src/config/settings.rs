//! User settings for doc-history
//!
//! Controls which fields replayed patches stamp, who the default modifier
//! is, how verbose logging is, and whether data files are backed up before
//! being rewritten.

use serde::{Deserialize, Serialize};

use super::paths::HistoryPaths;
use crate::error::HistoryError;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// One step more verbose per `-v`
    pub fn raised_by(self, steps: u8) -> Self {
        let order = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        let current = order.iter().position(|l| *l == self).unwrap_or(1);
        order[(current + steps as usize).min(order.len() - 1)]
    }

    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// User settings for doc-history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Field stamped with the modifier when a patch is replayed
    #[serde(default = "default_modifier_field")]
    pub modifier_field: String,

    /// Field holding a trackable's version
    #[serde(default = "default_version_field")]
    pub version_field: String,

    /// Modifier used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_modifier: Option<String>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Copy the documents file into backups/ before rewriting it
    #[serde(default = "default_true")]
    pub backup_before_write: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_modifier_field() -> String {
    "modifier_id".to_string()
}

fn default_version_field() -> String {
    "version".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            modifier_field: default_modifier_field(),
            version_field: default_version_field(),
            default_modifier: None,
            log_level: LogLevel::default(),
            backup_before_write: default_true(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &HistoryPaths) -> Result<Self, HistoryError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| HistoryError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| HistoryError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &HistoryPaths) -> Result<(), HistoryError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| HistoryError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| HistoryError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.modifier_field, "modifier_id");
        assert_eq!(settings.version_field, "version");
        assert_eq!(settings.log_level, LogLevel::Warn);
        assert!(settings.backup_before_write);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.modifier_field = "updated_by".into();
        settings.default_modifier = Some("ops".into());
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.modifier_field, "updated_by");
        assert_eq!(loaded.default_modifier.as_deref(), Some("ops"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"log_level": "debug"}"#).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.log_level, LogLevel::Debug);
        assert_eq!(loaded.modifier_field, "modifier_id");
    }

    #[test]
    fn test_log_level_raise() {
        assert_eq!(LogLevel::Warn.raised_by(0), LogLevel::Warn);
        assert_eq!(LogLevel::Warn.raised_by(2), LogLevel::Debug);
        assert_eq!(LogLevel::Info.raised_by(9), LogLevel::Trace);
    }
}
