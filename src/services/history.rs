//! History service
//!
//! Looks up the audit records of a trackable, classifies them for display,
//! and undoes or redoes a selection of versions in the right order.

use serde_json::Value;
use tracing::{debug, info};

use super::dispatcher::{ActionDispatcher, Outcome};
use crate::audit::{AuditLogger, AuditRecord, Changes, Direction, EditSummary};
use crate::error::{HistoryError, HistoryResult};
use crate::models::AssociationChain;
use crate::storage::{DocumentStore, Schema};

/// Which versions of a trackable to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// A single version
    Version(u64),
    /// An inclusive version range, in either order
    Range { from: u64, to: u64 },
    /// The most recent `n` versions
    Last(usize),
}

impl VersionSelector {
    /// Pick the matching records out of a version-ordered history
    pub fn select(&self, history: &[AuditRecord]) -> Vec<AuditRecord> {
        match *self {
            VersionSelector::Version(v) => {
                history.iter().filter(|r| r.version == v).cloned().collect()
            }
            VersionSelector::Range { from, to } => {
                let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
                history
                    .iter()
                    .filter(|r| r.version >= lo && r.version <= hi)
                    .cloned()
                    .collect()
            }
            VersionSelector::Last(n) => {
                let start = history.len().saturating_sub(n);
                history[start..].to_vec()
            }
        }
    }
}

impl std::fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSelector::Version(v) => write!(f, "v{}", v),
            VersionSelector::Range { from, to } => write!(f, "v{}..v{}", from, to),
            VersionSelector::Last(n) => write!(f, "last {}", n),
        }
    }
}

/// Service for browsing and replaying history
pub struct HistoryService<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    schema: &'a Schema,
    logger: &'a AuditLogger,
    modifier_field: Option<String>,
}

impl<'a, S: DocumentStore + ?Sized> HistoryService<'a, S> {
    pub fn new(store: &'a S, schema: &'a Schema, logger: &'a AuditLogger) -> Self {
        Self {
            store,
            schema,
            logger,
            modifier_field: None,
        }
    }

    /// Field stamped with the modifier on patched documents
    pub fn with_modifier_field(mut self, field: impl Into<String>) -> Self {
        self.modifier_field = Some(field.into());
        self
    }

    fn dispatcher(&self) -> ActionDispatcher<'a, S> {
        let dispatcher = ActionDispatcher::new(self.store);
        match &self.modifier_field {
            Some(field) => dispatcher.with_modifier_field(field.clone()),
            None => dispatcher,
        }
    }

    /// All records of a trackable, oldest version first
    pub fn history_for(&self, chain: &AssociationChain) -> HistoryResult<Vec<AuditRecord>> {
        self.logger.for_chain(chain)
    }

    /// A single record of a trackable
    pub fn record(&self, chain: &AssociationChain, version: u64) -> HistoryResult<AuditRecord> {
        self.history_for(chain)?
            .into_iter()
            .find(|r| r.version == version)
            .ok_or_else(|| HistoryError::record_not_found(format!("{} v{}", chain, version)))
    }

    /// Changes of a record restricted to currently tracked fields
    pub fn tracked_changes(&self, record: &AuditRecord) -> HistoryResult<Changes> {
        let model = self.schema.model_for_chain(&record.association_chain)?;
        Ok(record.tracked_changes(|field| self.schema.is_tracked_field(&model, field)))
    }

    /// Changes of a record classified for display
    pub fn tracked_edits(&self, record: &AuditRecord) -> HistoryResult<EditSummary> {
        let model = self.schema.model_for_chain(&record.association_chain)?;
        Ok(record.tracked_edits(
            |field| self.schema.is_tracked_field(&model, field),
            |field| self.schema.tracked_embeds_many(&model, field),
        ))
    }

    /// Undo the selected versions, newest first
    pub fn undo(
        &self,
        chain: &AssociationChain,
        modifier: Option<&Value>,
        selector: VersionSelector,
    ) -> HistoryResult<Vec<Outcome>> {
        self.replay(chain, modifier, selector, Direction::Undo)
    }

    /// Redo the selected versions, oldest first
    pub fn redo(
        &self,
        chain: &AssociationChain,
        modifier: Option<&Value>,
        selector: VersionSelector,
    ) -> HistoryResult<Vec<Outcome>> {
        self.replay(chain, modifier, selector, Direction::Redo)
    }

    fn replay(
        &self,
        chain: &AssociationChain,
        modifier: Option<&Value>,
        selector: VersionSelector,
        direction: Direction,
    ) -> HistoryResult<Vec<Outcome>> {
        let mut selected = selector.select(&self.history_for(chain)?);
        if selected.is_empty() {
            return Err(HistoryError::record_not_found(format!("{} {}", chain, selector)));
        }

        selected.sort_by_key(|r| r.version);
        if direction == Direction::Undo {
            selected.reverse();
        }
        debug!(%chain, %selector, count = selected.len(), %direction, "replaying versions");

        let dispatcher = self.dispatcher();
        let mut outcomes = Vec::with_capacity(selected.len());
        for record in &selected {
            outcomes.push(dispatcher.dispatch(record, direction, modifier)?);
        }

        info!(%chain, %selector, %direction, "replay complete");
        Ok(outcomes)
    }
}
