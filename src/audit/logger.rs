//! Append-only history log
//!
//! Provides the AuditLogger struct that writes audit records to a log file
//! and looks them up by trackable. Each record is written as a single JSON
//! line and flushed immediately.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::error::{HistoryError, HistoryResult};
use crate::models::AssociationChain;

use super::entry::AuditRecord;

/// Handles reading and writing the history log file
///
/// The log file uses a line-delimited JSON format (JSONL) where each line
/// is a complete JSON object representing one audit record.
pub struct AuditLogger {
    /// Path to the history log file
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    fn open_for_append(&self) -> HistoryResult<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| HistoryError::Io(format!("Failed to open history log: {}", e)))
    }

    /// Append a record and flush
    pub fn log(&self, record: &AuditRecord) -> HistoryResult<()> {
        self.log_batch(std::slice::from_ref(record))
    }

    /// Append several records, flushing once at the end
    pub fn log_batch(&self, records: &[AuditRecord]) -> HistoryResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut file = self.open_for_append()?;

        for record in records {
            let json = serde_json::to_string(record).map_err(|e| {
                HistoryError::Json(format!("Failed to serialize audit record: {}", e))
            })?;

            writeln!(file, "{}", json)
                .map_err(|e| HistoryError::Io(format!("Failed to write audit record: {}", e)))?;
        }

        file.flush()
            .map_err(|e| HistoryError::Io(format!("Failed to flush history log: {}", e)))?;

        debug!(count = records.len(), path = %self.log_path.display(), "appended audit records");
        Ok(())
    }

    /// Read all audit records from the log file
    ///
    /// Returns records in the order they were written.
    pub fn read_all(&self) -> HistoryResult<Vec<AuditRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| HistoryError::Io(format!("Failed to open history log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                HistoryError::Io(format!(
                    "Failed to read history log line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: AuditRecord = serde_json::from_str(&line).map_err(|e| {
                HistoryError::Json(format!(
                    "Failed to parse audit record at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            records.push(record);
        }

        Ok(records)
    }

    /// Records of one trackable, ordered by version
    pub fn for_chain(&self, chain: &AssociationChain) -> HistoryResult<Vec<AuditRecord>> {
        let mut records: Vec<AuditRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| &r.association_chain == chain)
            .collect();
        records.sort_by_key(|r| r.version);
        Ok(records)
    }

    /// Records of every trackable living under a root type
    pub fn for_scope(&self, scope: &str) -> HistoryResult<Vec<AuditRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.scope == scope)
            .collect())
    }

    /// Version the next record of `chain` should carry
    pub fn next_version(&self, chain: &AssociationChain) -> HistoryResult<u64> {
        let last = self
            .for_chain(chain)?
            .iter()
            .map(|r| r.version)
            .max()
            .unwrap_or(0);
        Ok(last + 1)
    }

    /// Read the most recent N records from the log
    pub fn read_recent(&self, count: usize) -> HistoryResult<Vec<AuditRecord>> {
        let all = self.read_all()?;
        let start = all.len().saturating_sub(count);
        Ok(all[start..].to_vec())
    }

    /// Check if the history log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the history log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::Action;
    use crate::models::{ChainNode, Fields};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn create_test_logger() -> (AuditLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("history.log");
        let logger = AuditLogger::new(log_path);
        (logger, temp_dir)
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn order(id: i64) -> AssociationChain {
        AssociationChain::root("Order", id)
    }

    #[test]
    fn test_log_and_read() {
        let (logger, _temp) = create_test_logger();
        let record = AuditRecord::create(order(1), 1, None, fields(json!({"_id": 1})));

        logger.log(&record).unwrap();

        let records = logger.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, Action::Create);
        assert_eq!(records[0], record);
    }

    #[test]
    fn test_for_chain_filters_and_sorts() {
        let (logger, _temp) = create_test_logger();
        let item = order(1).child(ChainNode::new("lineItems", 5));
        let update = |version: u64, from: i64, to: i64| {
            AuditRecord::update(
                order(1),
                version,
                None,
                fields(json!({"a": from})),
                fields(json!({"a": to})),
            )
        };

        logger
            .log_batch(&[
                update(3, 2, 3),
                AuditRecord::create(order(1), 1, None, fields(json!({"_id": 1}))),
                AuditRecord::create(order(2), 1, None, fields(json!({"_id": 2}))),
                AuditRecord::create(item.clone(), 1, None, fields(json!({"_id": 5}))),
                update(2, 1, 2),
            ])
            .unwrap();

        let versions: Vec<u64> = logger
            .for_chain(&order(1))
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(logger.for_chain(&item).unwrap().len(), 1);
        assert_eq!(logger.for_scope("Order").unwrap().len(), 5);
        assert_eq!(logger.next_version(&order(1)).unwrap(), 4);
        assert_eq!(logger.next_version(&order(9)).unwrap(), 1);
    }

    #[test]
    fn test_read_recent() {
        let (logger, _temp) = create_test_logger();

        for i in 0..10 {
            logger
                .log(&AuditRecord::create(order(i), 1, None, fields(json!({"_id": i}))))
                .unwrap();
        }

        let recent = logger.read_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].association_chain, order(7));
        assert_eq!(recent[2].association_chain, order(9));
    }

    #[test]
    fn test_empty_log() {
        let (logger, _temp) = create_test_logger();

        assert!(!logger.exists());
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let (logger, _temp) = create_test_logger();
        logger
            .log(&AuditRecord::create(order(1), 1, None, fields(json!({"_id": 1}))))
            .unwrap();
        std::fs::write(
            logger.path(),
            format!("{}\nnot json\n", std::fs::read_to_string(logger.path()).unwrap().trim()),
        )
        .unwrap();

        let err = logger.read_all().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_survives_restart() {
        let (logger, temp) = create_test_logger();
        logger
            .log(&AuditRecord::create(order(1), 1, None, fields(json!({"_id": 1}))))
            .unwrap();

        let logger2 = AuditLogger::new(temp.path().join("history.log"));
        assert_eq!(logger2.read_all().unwrap().len(), 1);
    }
}
