//! Audit record data structures
//!
//! Defines the recorded action and the audit record format itself. Records
//! are immutable once written; the history engine only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diff::{compute_changes, summarize_edits_with, Changes, EditSummary};
use crate::models::{AssociationChain, Fields, RecordId};

/// Types of actions that can be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Trackable was created
    Create,
    /// Trackable was updated
    Update,
    /// Trackable was destroyed
    Destroy,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "CREATE"),
            Action::Update => write!(f, "UPDATE"),
            Action::Destroy => write!(f, "DESTROY"),
        }
    }
}

/// A single audit record
///
/// Describes one change to the trackable at the end of `association_chain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordFields")]
pub struct AuditRecord {
    pub id: RecordId,

    /// When the change occurred (UTC)
    pub created_at: DateTime<Utc>,

    pub action: Action,

    /// Type name of the root document
    pub scope: String,

    /// Root-first path to the trackable
    pub association_chain: AssociationChain,

    /// Field values before the change
    #[serde(skip_serializing_if = "Fields::is_empty")]
    pub original: Fields,

    /// Field values after the change
    #[serde(skip_serializing_if = "Fields::is_empty")]
    pub modified: Fields,

    /// Version of the trackable this record produced; 0 until assigned
    pub version: u64,

    /// Whoever made the change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<Value>,
}

/// Serialized form of a record; everything but the action and chain may be
/// missing from records written by other tools
#[derive(Deserialize)]
struct RecordFields {
    #[serde(default)]
    id: RecordId,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    action: Action,
    #[serde(default)]
    scope: Option<String>,
    association_chain: AssociationChain,
    #[serde(default)]
    original: Fields,
    #[serde(default)]
    modified: Fields,
    #[serde(default)]
    version: u64,
    #[serde(default)]
    modifier: Option<Value>,
}

impl From<RecordFields> for AuditRecord {
    fn from(fields: RecordFields) -> Self {
        let scope = fields
            .scope
            .filter(|s| !s.is_empty())
            .or_else(|| fields.association_chain.scope().map(str::to_string))
            .unwrap_or_default();
        Self {
            id: fields.id,
            created_at: fields.created_at,
            action: fields.action,
            scope,
            association_chain: fields.association_chain,
            original: fields.original,
            modified: fields.modified,
            version: fields.version,
            modifier: fields.modifier,
        }
    }
}

impl AuditRecord {
    fn build(
        action: Action,
        chain: AssociationChain,
        version: u64,
        modifier: Option<Value>,
        original: Fields,
        modified: Fields,
    ) -> Self {
        Self {
            id: RecordId::new(),
            created_at: Utc::now(),
            action,
            scope: chain.scope().unwrap_or_default().to_string(),
            association_chain: chain,
            original,
            modified,
            version,
            modifier,
        }
    }

    /// Record the creation of a trackable with its initial attributes
    pub fn create(
        chain: AssociationChain,
        version: u64,
        modifier: Option<Value>,
        attributes: Fields,
    ) -> Self {
        Self::build(
            Action::Create,
            chain,
            version,
            modifier,
            Fields::new(),
            attributes,
        )
    }

    /// Record an update from `original` to `modified` field values
    pub fn update(
        chain: AssociationChain,
        version: u64,
        modifier: Option<Value>,
        original: Fields,
        modified: Fields,
    ) -> Self {
        Self::build(Action::Update, chain, version, modifier, original, modified)
    }

    /// Record the destruction of a trackable
    ///
    /// The final snapshot is kept on both sides so the document can be
    /// re-created from `modified`.
    pub fn destroy(
        chain: AssociationChain,
        version: u64,
        modifier: Option<Value>,
        attributes: Fields,
    ) -> Self {
        Self::build(
            Action::Destroy,
            chain,
            version,
            modifier,
            attributes.clone(),
            attributes,
        )
    }

    /// Attributes a re-created trackable is built from
    ///
    /// Prefers `modified`; records that only carry the snapshot in
    /// `original` fall back to it.
    pub fn recreate_attributes(&self) -> &Fields {
        if self.modified.is_empty() {
            &self.original
        } else {
            &self.modified
        }
    }

    /// Tracked field changes of this record
    pub fn tracked_changes<F>(&self, is_tracked: F) -> Changes
    where
        F: Fn(&str) -> bool,
    {
        compute_changes(&self.original, &self.modified, is_tracked)
    }

    /// Tracked changes classified for history display
    pub fn tracked_edits<F, E>(&self, is_tracked: F, is_embeds_many: E) -> EditSummary
    where
        F: Fn(&str) -> bool,
        E: Fn(&str) -> bool,
    {
        summarize_edits_with(&self.tracked_changes(is_tracked), is_embeds_many)
    }

    /// Format the record for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] v{} {} {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.version,
            self.action,
            self.association_chain
        );

        if let Some(modifier) = &self.modifier {
            output.push_str(&format!(" by {}", display_modifier(modifier)));
        }

        output
    }
}

/// Render a modifier reference without JSON quoting for strings
pub fn display_modifier(modifier: &Value) -> String {
    match modifier {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
