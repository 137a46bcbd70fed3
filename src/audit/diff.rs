//! Change sets and edit classification for audit records
//!
//! Turns the `original`/`modified` field maps of a record into per-field
//! change entries, classifies those for history display, and computes the
//! live baseline undo/redo patches are built on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Fields, ID_FIELD};

/// Before/after values of a single field
///
/// A side is `None` when the field was missing or null on that side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

impl ChangeEntry {
    pub fn new(from: Option<Value>, to: Option<Value>) -> Self {
        Self {
            from: from.filter(|v| !v.is_null()),
            to: to.filter(|v| !v.is_null()),
        }
    }

    /// True when neither side carries a meaningful value
    pub fn is_blank(&self) -> bool {
        is_blank(self.from.as_ref()) && is_blank(self.to.as_ref())
    }
}

/// Field name to change entry
pub type Changes = BTreeMap<String, ChangeEntry>;

/// Added and removed elements of an array field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayEdit {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<Value>,
}

impl ArrayEdit {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Changes to an embedded collection, matched by `_id`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmbedsManyEdit {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modify: Vec<ChangeEntry>,
}

impl EmbedsManyEdit {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.modify.is_empty()
    }
}

/// Classified edits of a record, ready for display
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditSummary {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub remove: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modify: BTreeMap<String, ChangeEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub array: BTreeMap<String, ArrayEdit>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub embeds_many: BTreeMap<String, EmbedsManyEdit>,
}

impl EditSummary {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
            && self.remove.is_empty()
            && self.modify.is_empty()
            && self.array.is_empty()
            && self.embeds_many.is_empty()
    }
}

/// Shared blank predicate
///
/// Missing, null, empty or whitespace-only strings, empty arrays and empty
/// objects are all blank. Every classification in this module goes through
/// this function.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Union of the keys of two field maps, sorted
fn key_union<'a>(a: &'a Fields, b: &'a Fields) -> Vec<&'a String> {
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Compute the tracked change set between two field maps
///
/// Keys failing `is_tracked` are dropped even when historical data exists
/// for them, as are entries blank on both sides.
pub fn compute_changes<F>(original: &Fields, modified: &Fields, is_tracked: F) -> Changes
where
    F: Fn(&str) -> bool,
{
    key_union(original, modified)
        .into_iter()
        .filter(|key| is_tracked(key))
        .filter_map(|key| {
            let entry = ChangeEntry::new(original.get(key).cloned(), modified.get(key).cloned());
            if entry.is_blank() {
                None
            } else {
                Some((key.clone(), entry))
            }
        })
        .collect()
}

/// Classify a change set into add/remove/modify/array buckets
pub fn summarize_edits(changes: &Changes) -> EditSummary {
    summarize_edits_with(changes, |_| false)
}

/// Classify a change set, routing tracked embed-many fields to `embeds_many`
pub fn summarize_edits_with<E>(changes: &Changes, is_embeds_many: E) -> EditSummary
where
    E: Fn(&str) -> bool,
{
    let mut summary = EditSummary::default();

    for (field, change) in changes {
        if change.is_blank() {
            continue;
        }

        let from = change.from.as_ref();
        let to = change.to.as_ref();

        if is_embeds_many(field) {
            let edit = embeds_many_edit(from, to);
            if !edit.is_empty() {
                summary.embeds_many.insert(field.clone(), edit);
            }
        } else if is_blank(from) {
            if let Some(to) = to {
                summary.add.insert(field.clone(), to.clone());
            }
        } else if is_blank(to) {
            if let Some(from) = from {
                summary.remove.insert(field.clone(), from.clone());
            }
        } else if let (Some(Value::Array(from)), Some(Value::Array(to))) = (from, to) {
            let edit = ArrayEdit {
                add: difference(to, from),
                remove: difference(from, to),
            };
            if !edit.is_empty() {
                summary.array.insert(field.clone(), edit);
            }
        } else {
            summary.modify.insert(field.clone(), change.clone());
        }
    }

    summary
}

/// Elements of `a` that do not occur in `b`
fn difference(a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter().filter(|v| !b.contains(v)).cloned().collect()
}

fn as_slice(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn embeds_many_edit(from: Option<&Value>, to: Option<&Value>) -> EmbedsManyEdit {
    let from = as_slice(from);
    let to = as_slice(to);

    let find = |docs: &[Value], id: &Value| -> Option<Value> {
        docs.iter().find(|d| d.get(ID_FIELD) == Some(id)).cloned()
    };

    let mut modify = Vec::new();
    for id in from.iter().filter_map(|d| d.get(ID_FIELD)) {
        if to.iter().any(|d| d.get(ID_FIELD) == Some(id)) {
            let before = find(from, id);
            let after = find(to, id);
            if before != after {
                modify.push(ChangeEntry::new(before, after));
            }
        }
    }

    let touched: Vec<Value> = modify
        .iter()
        .flat_map(|c| c.from.iter().chain(c.to.iter()).cloned())
        .collect();

    EmbedsManyEdit {
        add: difference(&difference(to, from), &touched),
        remove: difference(&difference(from, to), &touched),
        modify,
    }
}

/// Live baseline for undo/redo patches
///
/// For every key of either map, the live value when the trackable still
/// exists (null when it lacks the field), otherwise the recorded `modified`
/// value. Live values win so edits made after the record are kept.
pub fn affected(original: &Fields, modified: &Fields, current: Option<&Fields>) -> Fields {
    key_union(original, modified)
        .into_iter()
        .map(|key| {
            let value = match current {
                Some(live) => live.get(key),
                None => modified.get(key),
            };
            (key.clone(), value.cloned().unwrap_or(Value::Null))
        })
        .collect()
}
