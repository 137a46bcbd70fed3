//! Path management for doc-history
//!
//! ## Path Resolution Order
//!
//! 1. `DOC_HISTORY_DATA_DIR` environment variable (if set)
//! 2. The platform config directory (`~/.config/doc-history` on Linux,
//!    `~/Library/Application Support/doc-history` on macOS,
//!    `%APPDATA%\doc-history` on Windows)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::HistoryError;

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "DOC_HISTORY_DATA_DIR";

/// Manages all paths used by doc-history
#[derive(Debug, Clone)]
pub struct HistoryPaths {
    base_dir: PathBuf,
}

impl HistoryPaths {
    /// Resolve the base directory from the environment or the platform
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, HistoryError> {
        let base_dir = match std::env::var(DATA_DIR_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => ProjectDirs::from("", "", "doc-history")
                .map(|dirs| dirs.config_dir().to_path_buf())
                .ok_or_else(|| {
                    HistoryError::Config("Could not determine a configuration directory".into())
                })?,
        };

        Ok(Self { base_dir })
    }

    /// Create HistoryPaths with a custom base directory
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Directory holding documents and schema
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// The JSONL history log
    pub fn history_log(&self) -> PathBuf {
        self.base_dir.join("history.log")
    }

    pub fn documents_file(&self) -> PathBuf {
        self.data_dir().join("documents.json")
    }

    pub fn schema_file(&self) -> PathBuf {
        self.data_dir().join("schema.json")
    }

    /// Ensure base, data and backup directories exist
    pub fn ensure_directories(&self) -> Result<(), HistoryError> {
        for dir in [self.base_dir.clone(), self.data_dir(), self.backup_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                HistoryError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}
