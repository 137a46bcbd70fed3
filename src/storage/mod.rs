//! Storage layer for doc-history
//!
//! Defines the document store capability the history engine needs, the
//! schema it consults, and a hierarchical in-memory store persisted to a
//! JSON file with atomic writes.

pub mod file_io;
pub mod memory;
pub mod schema;

pub use file_io::{backup_copy, read_json, write_json_atomic};
pub use memory::MemoryStore;
pub use schema::{FieldSelection, ModelSchema, Relation, RelationKind, Schema};

use tracing::debug;

use crate::audit::AuditLogger;
use crate::config::paths::HistoryPaths;
use crate::error::HistoryResult;
use crate::models::{Document, DocumentId, Fields};

/// Operations a hierarchical document store provides to the history engine
///
/// Documents are handed out as snapshots whose attributes include their
/// embedded documents under the relation names; mutations locate their
/// target through the snapshot's association chain. Every mutation must be
/// atomic for the document it touches.
pub trait DocumentStore {
    /// Find a root document by type and id
    fn find_root(&self, type_name: &str, id: &DocumentId) -> HistoryResult<Option<Document>>;

    /// How `name` on `document` embeds other documents
    fn relation_kind(&self, document: &Document, name: &str) -> RelationKind;

    /// The document embedded under an embed-one relation
    fn embedded_one(&self, document: &Document, name: &str) -> HistoryResult<Option<Document>>;

    /// The documents embedded under an embed-many relation
    fn embedded_many(&self, document: &Document, name: &str) -> HistoryResult<Vec<Document>>;

    /// Insert a root document under a caller-chosen id
    fn create_root(
        &self,
        type_name: &str,
        attributes: &Fields,
        id: &DocumentId,
    ) -> HistoryResult<Document>;

    /// Set the document of an embed-one relation
    fn create_embedded_one(
        &self,
        parent: &Document,
        name: &str,
        attributes: &Fields,
    ) -> HistoryResult<Document>;

    /// Append a document to an embed-many relation
    fn append_embedded_many(
        &self,
        parent: &Document,
        name: &str,
        attributes: &Fields,
    ) -> HistoryResult<Document>;

    /// Write all given attributes or none of them
    ///
    /// A value under an embedded relation replaces the embedded documents;
    /// null removes them.
    fn update_attributes(&self, document: &Document, attributes: &Fields)
        -> HistoryResult<Document>;

    /// Remove a document; succeeds when it is already gone
    fn destroy(&self, document: &Document) -> HistoryResult<()>;
}

/// Storage coordinator: the document store, its schema and the history log
pub struct Storage {
    paths: HistoryPaths,
    pub documents: MemoryStore,
    pub history: AuditLogger,
}

impl Storage {
    /// Open storage under `paths`, creating directories as needed
    pub fn open(paths: HistoryPaths) -> HistoryResult<Self> {
        paths.ensure_directories()?;

        let schema: Schema = read_json(paths.schema_file())?;
        let documents = MemoryStore::open(paths.documents_file(), schema)?;
        let history = AuditLogger::new(paths.history_log());

        Ok(Self {
            documents,
            history,
            paths,
        })
    }

    pub fn paths(&self) -> &HistoryPaths {
        &self.paths
    }

    pub fn schema(&self) -> &Schema {
        self.documents.schema()
    }

    /// Persist the documents, optionally backing up the previous file
    pub fn save_documents(&self, backup: bool) -> HistoryResult<()> {
        if backup {
            let copied = backup_copy(self.paths.documents_file(), self.paths.backup_dir())?;
            if let Some(target) = copied {
                debug!(backup = %target.display(), "backed up documents");
            }
        }
        self.documents.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_storage_open_and_save() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());
        write_json_atomic(
            paths.schema_file(),
            &Schema::new().model("Order", ModelSchema::new()),
        )
        .unwrap();

        let storage = Storage::open(paths.clone()).unwrap();
        assert!(paths.data_dir().exists());
        assert!(storage.schema().get("Order").is_some());

        let attributes = json!({"_id": 1}).as_object().cloned().unwrap();
        storage.documents.insert_root("Order", attributes).unwrap();
        storage.save_documents(true).unwrap();
        storage.save_documents(true).unwrap();

        assert!(paths.documents_file().exists());
        assert_eq!(std::fs::read_dir(paths.backup_dir()).unwrap().count(), 1);

        let reopened = Storage::open(paths).unwrap();
        assert_eq!(reopened.documents.count("Order").unwrap(), 1);
    }
}
