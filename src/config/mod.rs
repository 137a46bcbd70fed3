//! Configuration module for doc-history
//!
//! - Platform-aware path resolution
//! - User settings persistence

pub mod paths;
pub mod settings;

pub use paths::HistoryPaths;
pub use settings::{LogLevel, Settings};
