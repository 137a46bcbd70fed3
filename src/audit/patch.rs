//! Undo/redo attribute sets
//!
//! Pure builders combining the live baseline from [`affected`] with a
//! record's recorded values. Callers apply the result through the store's
//! atomic update; nothing here touches a store.
//!
//! [`affected`]: super::diff::affected

use serde_json::Value;

use crate::models::Fields;

/// Direction a record is replayed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Undo => write!(f, "undo"),
            Direction::Redo => write!(f, "redo"),
        }
    }
}

/// Attribute set restoring the values a record replaced
///
/// Starts from the live baseline minus the recorded `modified` keys, lays
/// `original` on top and stamps the modifier. Fields the record introduced
/// are nulled.
pub fn build_undo_patch(
    affected: &Fields,
    original: &Fields,
    modified: &Fields,
    modifier: Option<&Value>,
    modifier_field: Option<&str>,
) -> Fields {
    build_patch(affected, modified, original, modifier, modifier_field)
}

/// Attribute set re-applying the values a record introduced
pub fn build_redo_patch(
    affected: &Fields,
    original: &Fields,
    modified: &Fields,
    modifier: Option<&Value>,
    modifier_field: Option<&str>,
) -> Fields {
    build_patch(affected, original, modified, modifier, modifier_field)
}

fn build_patch(
    affected: &Fields,
    discard: &Fields,
    restore: &Fields,
    modifier: Option<&Value>,
    modifier_field: Option<&str>,
) -> Fields {
    let mut patch: Fields = affected
        .iter()
        .filter(|(key, _)| !discard.contains_key(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, value) in restore {
        patch.insert(key.clone(), value.clone());
    }

    if let Some(field) = modifier_field {
        patch.insert(field.to_string(), modifier.cloned().unwrap_or(Value::Null));
    }

    for key in discard.keys() {
        if !patch.contains_key(key.as_str()) {
            patch.insert(key.clone(), Value::Null);
        }
    }

    patch
}

/// Patch for `direction`, computed against the live baseline
pub fn build_patch_for(
    direction: Direction,
    affected: &Fields,
    original: &Fields,
    modified: &Fields,
    modifier: Option<&Value>,
    modifier_field: Option<&str>,
) -> Fields {
    match direction {
        Direction::Undo => build_undo_patch(affected, original, modified, modifier, modifier_field),
        Direction::Redo => build_redo_patch(affected, original, modified, modifier, modifier_field),
    }
}
