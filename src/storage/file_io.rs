//! File I/O utilities with atomic writes
//!
//! Documents and schemas are kept as pretty-printed JSON files that are
//! replaced atomically, so a crash mid-write leaves the previous version.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::HistoryError;

/// Read JSON from a file, returning a default value if the file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, HistoryError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| HistoryError::Store(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| HistoryError::Store(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), HistoryError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            HistoryError::Store(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Temp file must live in the same directory for the rename to be atomic
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| HistoryError::Store(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| HistoryError::Store(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| HistoryError::Store(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| HistoryError::Store(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        HistoryError::Store(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Copy `path` into `backup_dir` under a timestamped name
///
/// Returns `None` when there is nothing to back up yet.
pub fn backup_copy<P, Q>(path: P, backup_dir: Q) -> Result<Option<PathBuf>, HistoryError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let backup_dir = backup_dir.as_ref();
    fs::create_dir_all(backup_dir)
        .map_err(|e| HistoryError::Io(format!("Failed to create backup directory: {}", e)))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let target = backup_dir.join(format!(
        "{}-{}.json",
        stem,
        Utc::now().format("%Y%m%dT%H%M%S%.3f")
    ));

    fs::copy(path, &target)
        .map_err(|e| HistoryError::Io(format!("Failed to back up {}: {}", path.display(), e)))?;

    Ok(Some(target))
}
