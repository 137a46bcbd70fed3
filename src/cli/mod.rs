//! CLI command handlers
//!
//! Bridges the clap argument parsing with the history service.

pub mod history;

pub use history::{handle_history_command, import_records, HistoryCommands, SelectorArgs};
