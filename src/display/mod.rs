//! Display formatting for terminal output

pub mod history;

pub use history::{format_history, format_record_details, format_value, summarize_line};
