//! Service layer for doc-history
//!
//! Chain resolution against a document store, single-record undo/redo
//! dispatch, and the history service built on both.

pub mod dispatcher;
pub mod history;
pub mod resolver;

pub use dispatcher::{ActionDispatcher, Outcome};
pub use history::{HistoryService, VersionSelector};
pub use resolver::{ChainResolver, ResolvedChain};
