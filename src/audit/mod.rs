//! Audit records and change tracking for doc-history
//!
//! Each change to a tracked document is described by an [`AuditRecord`]
//! holding the document's association chain and its `original`/`modified`
//! field values.
//!
//! # Architecture
//!
//! - `AuditRecord`: one recorded create, update or destroy, with version and
//!   modifier.
//! - `AuditLogger`: append-only JSONL storage of records with lookups by
//!   trackable.
//! - `diff`: tracked change sets, edit classification for display and the
//!   live baseline (`affected`) undo/redo are computed on.
//! - `patch`: the undo and redo attribute sets.
//!
//! # Example
//!
//! ```rust,ignore
//! use doc_history::audit::{AuditRecord, summarize_edits};
//!
//! let record = AuditRecord::update(chain, 2, Some(json!("alice")), original, modified);
//! let edits = summarize_edits(&record.tracked_changes(|f| schema_tracks(f)));
//! ```

mod diff;
mod entry;
mod logger;
mod patch;

pub use diff::{
    affected, compute_changes, is_blank, summarize_edits, summarize_edits_with, ArrayEdit,
    ChangeEntry, Changes, EditSummary, EmbedsManyEdit,
};
pub use entry::{display_modifier, Action, AuditRecord};
pub use logger::AuditLogger;
pub use patch::{build_patch_for, build_redo_patch, build_undo_patch, Direction};
