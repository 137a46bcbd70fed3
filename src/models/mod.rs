//! Core data models for doc-history
//!
//! Identifiers, association chains and document snapshots shared by the
//! audit, storage and service layers.

pub mod chain;
pub mod document;
pub mod ids;

pub use chain::{AssociationChain, ChainNode};
pub use document::{Document, Fields, ID_FIELD};
pub use ids::{DocumentId, RecordId};
