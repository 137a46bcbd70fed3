//! doc-history - change history for hierarchical documents
//!
//! Records what changed on a tracked document as an audit record, and can
//! undo or redo any recorded version against the live document store, even
//! when the document sits deep inside embedded relations or has since been
//! destroyed.
//!
//! # Architecture
//!
//! - `models`: identifiers, association chains and document snapshots
//! - `audit`: audit records, change classification, undo/redo patches and
//!   the JSONL history log
//! - `storage`: the document store capability, the tracking schema and a
//!   file-backed in-memory store
//! - `services`: chain resolution, action dispatch and the history service
//! - `config`: paths and settings
//! - `cli`, `display`: the `dochist` command line
//!
//! # Example
//!
//! ```rust,ignore
//! use doc_history::services::{HistoryService, VersionSelector};
//!
//! let service = HistoryService::new(&store, &schema, &logger);
//! service.undo(&"Order:1".parse()?, None, VersionSelector::Last(1))?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{HistoryError, HistoryResult};
