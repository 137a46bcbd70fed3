//! History display formatting
//!
//! Renders audit records and their classified edits for the terminal.

use serde_json::Value;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::audit::{display_modifier, AuditRecord, EditSummary};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Version")]
    version: u64,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "By")]
    modifier: String,
    #[tabled(rename = "Changes")]
    changes: String,
}

/// Format a JSON value for human-readable display
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            if s.chars().count() > 50 {
                let head: String = s.chars().take(47).collect();
                format!("\"{}...\"", head)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) if arr.len() > 5 => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
        other => other.to_string(),
    }
}

fn format_optional(value: Option<&Value>) -> String {
    value.map(format_value).unwrap_or_else(|| "(blank)".to_string())
}

/// One-line digest of an edit summary: `+added -removed ~modified`
pub fn summarize_line(edits: &EditSummary) -> String {
    let mut parts = Vec::new();
    parts.extend(edits.add.keys().map(|k| format!("+{}", k)));
    parts.extend(edits.remove.keys().map(|k| format!("-{}", k)));
    parts.extend(edits.modify.keys().map(|k| format!("~{}", k)));
    parts.extend(
        edits
            .array
            .iter()
            .map(|(k, a)| format!("{}[+{} -{}]", k, a.add.len(), a.remove.len())),
    );
    parts.extend(edits.embeds_many.iter().map(|(k, e)| {
        format!("{}{{+{} -{} ~{}}}", k, e.add.len(), e.remove.len(), e.modify.len())
    }));

    if parts.is_empty() {
        "(no tracked changes)".to_string()
    } else {
        parts.join(", ")
    }
}

/// Format a trackable's history as a table
pub fn format_history(entries: &[(AuditRecord, EditSummary)]) -> String {
    if entries.is_empty() {
        return "No history found.".to_string();
    }

    let rows: Vec<HistoryRow> = entries
        .iter()
        .map(|(record, edits)| HistoryRow {
            version: record.version,
            action: record.action.to_string(),
            when: record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            modifier: record
                .modifier
                .as_ref()
                .map(display_modifier)
                .unwrap_or_else(|| "-".to_string()),
            changes: summarize_line(edits),
        })
        .collect();

    Table::new(rows).with(Style::modern()).to_string()
}

/// Format one record with every classified edit on its own line
pub fn format_record_details(record: &AuditRecord, edits: &EditSummary) -> String {
    let mut output = record.format_human_readable();
    output.push('\n');

    if edits.is_empty() {
        output.push_str("  (no tracked changes)\n");
        return output;
    }

    for (field, value) in &edits.add {
        output.push_str(&format!("  add     {}: {}\n", field, format_value(value)));
    }
    for (field, value) in &edits.remove {
        output.push_str(&format!("  remove  {}: {}\n", field, format_value(value)));
    }
    for (field, change) in &edits.modify {
        output.push_str(&format!(
            "  modify  {}: {} -> {}\n",
            field,
            format_optional(change.from.as_ref()),
            format_optional(change.to.as_ref())
        ));
    }
    for (field, edit) in &edits.array {
        let mut line = format!("  array   {}:", field);
        if !edit.add.is_empty() {
            line.push_str(&format!(" +{}", format_value(&Value::Array(edit.add.clone()))));
        }
        if !edit.remove.is_empty() {
            line.push_str(&format!(" -{}", format_value(&Value::Array(edit.remove.clone()))));
        }
        output.push_str(&line);
        output.push('\n');
    }
    for (field, edit) in &edits.embeds_many {
        output.push_str(&format!(
            "  embeds  {}: {} added, {} removed, {} modified\n",
            field,
            edit.add.len(),
            edit.remove.len(),
            edit.modify.len()
        ));
    }

    output
}
