//! Hierarchical in-memory document store
//!
//! Root documents are grouped by type; each document may embed a single
//! document or a collection under a relation name, and snapshots render
//! those embedded documents back into the attributes. The whole tree sits
//! behind one RwLock, so every mutation is atomic. The tree can be loaded
//! from and saved to a JSON file.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::file_io::{read_json, write_json_atomic};
use super::schema::{Relation, RelationKind, Schema};
use super::DocumentStore;
use crate::error::{HistoryError, HistoryResult};
use crate::models::{AssociationChain, ChainNode, Document, DocumentId, Fields, ID_FIELD};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoredDoc {
    #[serde(default)]
    attributes: Fields,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    embedded: BTreeMap<String, Embedded>,
}

impl StoredDoc {
    fn id(&self) -> Option<DocumentId> {
        self.attributes.get(ID_FIELD).and_then(DocumentId::from_value)
    }

    fn has_id(&self, id: Option<&DocumentId>) -> bool {
        id.is_some() && self.id().as_ref() == id
    }

    /// Attributes with embedded documents rendered under their relation names
    fn snapshot(&self) -> Fields {
        let mut fields = self.attributes.clone();
        for (name, embedded) in &self.embedded {
            let value = match embedded {
                Embedded::One(doc) => Value::Object(doc.snapshot()),
                Embedded::Many(docs) => {
                    Value::Array(docs.iter().map(|d| Value::Object(d.snapshot())).collect())
                }
            };
            fields.insert(name.clone(), value);
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum Embedded {
    // Tried first: a struct would also accept a JSON array
    Many(Vec<StoredDoc>),
    One(Box<StoredDoc>),
}

/// Serializable store contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    roots: BTreeMap<String, Vec<StoredDoc>>,
}

fn locate<'a>(
    roots: &'a BTreeMap<String, Vec<StoredDoc>>,
    chain: &AssociationChain,
) -> Option<&'a StoredDoc> {
    let (first, rest) = chain.nodes().split_first()?;
    let mut current = roots
        .get(&first.name)?
        .iter()
        .find(|d| d.has_id(first.id.as_ref()))?;
    for node in rest {
        current = match current.embedded.get(&node.name)? {
            Embedded::One(doc) => doc.as_ref(),
            Embedded::Many(docs) => docs.iter().find(|d| d.has_id(node.id.as_ref()))?,
        };
    }
    Some(current)
}

fn locate_mut<'a>(
    roots: &'a mut BTreeMap<String, Vec<StoredDoc>>,
    chain: &AssociationChain,
) -> Option<&'a mut StoredDoc> {
    let (first, rest) = chain.nodes().split_first()?;
    let mut current = roots
        .get_mut(&first.name)?
        .iter_mut()
        .find(|d| d.has_id(first.id.as_ref()))?;
    for node in rest {
        current = match current.embedded.get_mut(&node.name)? {
            Embedded::One(doc) => doc.as_mut(),
            Embedded::Many(docs) => docs.iter_mut().find(|d| d.has_id(node.id.as_ref()))?,
        };
    }
    Some(current)
}

/// Ensure `attributes` carries `_id`, generating one when absent
fn with_id(attributes: &Fields) -> (Fields, DocumentId) {
    let mut attributes = attributes.clone();
    let id = match attributes.get(ID_FIELD).and_then(DocumentId::from_value) {
        Some(id) => id,
        None => {
            let id = DocumentId::generate();
            attributes.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            id
        }
    };
    (attributes, id)
}

/// Document store keeping the whole tree in memory
pub struct MemoryStore {
    path: Option<PathBuf>,
    schema: Schema,
    data: RwLock<StoreData>,
}

impl MemoryStore {
    /// Create an empty store with no backing file
    pub fn new(schema: Schema) -> Self {
        Self {
            path: None,
            schema,
            data: RwLock::new(StoreData::default()),
        }
    }

    /// Load a store from `path`; a missing file yields an empty store
    pub fn open(path: PathBuf, schema: Schema) -> HistoryResult<Self> {
        let data: StoreData = read_json(&path)?;
        debug!(path = %path.display(), types = data.roots.len(), "loaded document store");
        Ok(Self {
            path: Some(path),
            schema,
            data: RwLock::new(data),
        })
    }

    /// Write the store back to its file
    pub fn save(&self) -> HistoryResult<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| HistoryError::Config("Store has no backing file".into()))?;
        let data = self.read()?;
        write_json_atomic(path, &*data)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    fn read(&self) -> HistoryResult<RwLockReadGuard<'_, StoreData>> {
        self.data
            .read()
            .map_err(|e| HistoryError::Store(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> HistoryResult<RwLockWriteGuard<'_, StoreData>> {
        self.data
            .write()
            .map_err(|e| HistoryError::Store(format!("Failed to acquire write lock: {}", e)))
    }

    /// Relation of `name` on `document` if it is of the expected kind
    fn expect_relation(
        &self,
        document: &Document,
        name: &str,
        kind: RelationKind,
    ) -> HistoryResult<String> {
        self.schema
            .relation(&document.model, name)
            .filter(|r| r.kind == kind)
            .map(|r| r.model.clone())
            .ok_or_else(|| HistoryError::schema_inconsistency(name, &document.model))
    }

    /// Split `fields` into plain attributes and documents embedded under the
    /// relations `model` declares
    fn build_stored(&self, model: &str, fields: &Fields) -> HistoryResult<StoredDoc> {
        let mut stored = StoredDoc::default();
        for (key, value) in fields {
            match self.embedded_relation(model, key) {
                Some(relation) => {
                    if let Some(embedded) = self.build_embedded(relation, key, value)? {
                        stored.embedded.insert(key.clone(), embedded);
                    }
                }
                None => {
                    stored.attributes.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(stored)
    }

    /// Embedded documents for a relation value; `None` clears the relation
    fn build_embedded(
        &self,
        relation: &Relation,
        name: &str,
        value: &Value,
    ) -> HistoryResult<Option<Embedded>> {
        match (relation.kind, value) {
            (_, Value::Null) => Ok(None),
            (RelationKind::EmbedMany, Value::Array(items)) => {
                let children = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(fields) => self.build_stored(&relation.model, fields),
                        other => Err(HistoryError::Store(format!(
                            "'{}' holds {} where a document was expected",
                            name, other
                        ))),
                    })
                    .collect::<HistoryResult<Vec<_>>>()?;
                Ok(Some(Embedded::Many(children)))
            }
            (RelationKind::EmbedOne, Value::Object(fields)) => Ok(Some(Embedded::One(Box::new(
                self.build_stored(&relation.model, fields)?,
            )))),
            _ => Err(HistoryError::Store(format!(
                "'{}' cannot hold {}",
                name, value
            ))),
        }
    }

    fn embedded_relation(&self, model: &str, name: &str) -> Option<&Relation> {
        self.schema
            .relation(model, name)
            .filter(|r| r.kind != RelationKind::None)
    }

    /// Insert a root document, generating `_id` when absent
    pub fn insert_root(&self, type_name: &str, attributes: Fields) -> HistoryResult<Document> {
        let (attributes, id) = with_id(&attributes);
        self.create_root(type_name, &attributes, &id)
    }

    /// Snapshot of the document at `chain`
    pub fn get(&self, chain: &AssociationChain) -> HistoryResult<Option<Document>> {
        let data = self.read()?;
        match locate(&data.roots, chain) {
            Some(stored) => {
                let model = self.schema.model_for_chain(chain)?;
                Ok(Some(Document::new(model, chain.clone(), stored.snapshot())))
            }
            None => Ok(None),
        }
    }

    /// Number of root documents of a type
    pub fn count(&self, type_name: &str) -> HistoryResult<usize> {
        let data = self.read()?;
        Ok(data.roots.get(type_name).map(Vec::len).unwrap_or(0))
    }
}

impl DocumentStore for MemoryStore {
    fn find_root(&self, type_name: &str, id: &DocumentId) -> HistoryResult<Option<Document>> {
        let data = self.read()?;
        Ok(data
            .roots
            .get(type_name)
            .and_then(|docs| docs.iter().find(|d| d.has_id(Some(id))))
            .map(|d| {
                Document::new(
                    type_name,
                    AssociationChain::root(type_name, id.clone()),
                    d.snapshot(),
                )
            }))
    }

    fn relation_kind(&self, document: &Document, name: &str) -> RelationKind {
        self.schema.relation_kind(&document.model, name)
    }

    fn embedded_one(&self, document: &Document, name: &str) -> HistoryResult<Option<Document>> {
        let model = self.expect_relation(document, name, RelationKind::EmbedOne)?;
        let data = self.read()?;
        let Some(parent) = locate(&data.roots, &document.chain) else {
            return Ok(None);
        };

        match parent.embedded.get(name) {
            Some(Embedded::One(child)) => Ok(Some(Document::new(
                model,
                document.chain.child(ChainNode::embedded_one(name)),
                child.snapshot(),
            ))),
            Some(Embedded::Many(_)) => Err(HistoryError::Store(format!(
                "'{}' on {} holds a collection, expected a single document",
                name, document.chain
            ))),
            None => Ok(None),
        }
    }

    fn embedded_many(&self, document: &Document, name: &str) -> HistoryResult<Vec<Document>> {
        let model = self.expect_relation(document, name, RelationKind::EmbedMany)?;
        let data = self.read()?;
        let Some(parent) = locate(&data.roots, &document.chain) else {
            return Ok(Vec::new());
        };

        match parent.embedded.get(name) {
            Some(Embedded::Many(children)) => Ok(children
                .iter()
                .map(|child| {
                    let node = ChainNode {
                        name: name.to_string(),
                        id: child.id(),
                    };
                    Document::new(model.clone(), document.chain.child(node), child.snapshot())
                })
                .collect()),
            Some(Embedded::One(_)) => Err(HistoryError::Store(format!(
                "'{}' on {} holds a single document, expected a collection",
                name, document.chain
            ))),
            None => Ok(Vec::new()),
        }
    }

    fn create_root(
        &self,
        type_name: &str,
        attributes: &Fields,
        id: &DocumentId,
    ) -> HistoryResult<Document> {
        let mut attributes = attributes.clone();
        let recorded = attributes.get(ID_FIELD).and_then(DocumentId::from_value);
        if recorded.as_ref() != Some(id) {
            attributes.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        }

        let stored = self.build_stored(type_name, &attributes)?;
        let snapshot = stored.snapshot();

        let mut data = self.write()?;
        let docs = data.roots.entry(type_name.to_string()).or_default();
        if docs.iter().any(|d| d.has_id(Some(id))) {
            return Err(HistoryError::Store(format!(
                "{} {} already exists",
                type_name, id
            )));
        }
        docs.push(stored);

        debug!(type_name, %id, "created root document");
        Ok(Document::new(
            type_name,
            AssociationChain::root(type_name, id.clone()),
            snapshot,
        ))
    }

    fn create_embedded_one(
        &self,
        parent: &Document,
        name: &str,
        attributes: &Fields,
    ) -> HistoryResult<Document> {
        let model = self.expect_relation(parent, name, RelationKind::EmbedOne)?;
        let child = self.build_stored(&model, attributes)?;
        let snapshot = child.snapshot();

        let mut data = self.write()?;
        let stored = locate_mut(&mut data.roots, &parent.chain)
            .ok_or_else(|| HistoryError::document_not_found(parent.chain.to_string()))?;
        stored
            .embedded
            .insert(name.to_string(), Embedded::One(Box::new(child)));

        let chain = parent.chain.child(ChainNode::embedded_one(name));
        debug!(%chain, "set embedded document");
        Ok(Document::new(model, chain, snapshot))
    }

    fn append_embedded_many(
        &self,
        parent: &Document,
        name: &str,
        attributes: &Fields,
    ) -> HistoryResult<Document> {
        let model = self.expect_relation(parent, name, RelationKind::EmbedMany)?;
        let (attributes, id) = with_id(attributes);
        let child = self.build_stored(&model, &attributes)?;
        let snapshot = child.snapshot();

        let mut data = self.write()?;
        let stored = locate_mut(&mut data.roots, &parent.chain)
            .ok_or_else(|| HistoryError::document_not_found(parent.chain.to_string()))?;

        match stored
            .embedded
            .entry(name.to_string())
            .or_insert_with(|| Embedded::Many(Vec::new()))
        {
            Embedded::Many(children) => {
                if children.iter().any(|d| d.has_id(Some(&id))) {
                    return Err(HistoryError::Store(format!(
                        "{} {} already exists under {}",
                        name, id, parent.chain
                    )));
                }
                children.push(child);
            }
            Embedded::One(_) => {
                return Err(HistoryError::Store(format!(
                    "'{}' on {} holds a single document, expected a collection",
                    name, parent.chain
                )))
            }
        }

        let chain = parent.chain.child(ChainNode::new(name, id));
        debug!(%chain, "appended embedded document");
        Ok(Document::new(model, chain, snapshot))
    }

    fn update_attributes(
        &self,
        document: &Document,
        attributes: &Fields,
    ) -> HistoryResult<Document> {
        // Build embedded replacements before locking so a rejected patch
        // changes nothing
        let mut plain = Vec::new();
        let mut relations = Vec::new();
        for (key, value) in attributes {
            match self.embedded_relation(&document.model, key) {
                Some(relation) => {
                    relations.push((key, self.build_embedded(relation, key, value)?));
                }
                None => plain.push((key, value)),
            }
        }

        let mut data = self.write()?;
        let stored = locate_mut(&mut data.roots, &document.chain)
            .ok_or_else(|| HistoryError::document_not_found(document.chain.to_string()))?;

        if let Some(new_id) = attributes.get(ID_FIELD) {
            if DocumentId::from_value(new_id) != stored.id() {
                return Err(HistoryError::Store(format!(
                    "Refusing to change the id of {}",
                    document.chain
                )));
            }
        }

        for (key, value) in plain {
            stored.attributes.insert(key.clone(), value.clone());
        }
        for (key, embedded) in relations {
            match embedded {
                Some(embedded) => {
                    stored.embedded.insert(key.clone(), embedded);
                }
                None => {
                    stored.embedded.remove(key);
                }
            }
        }

        debug!(chain = %document.chain, fields = attributes.len(), "updated attributes");
        Ok(Document::new(
            document.model.clone(),
            document.chain.clone(),
            stored.snapshot(),
        ))
    }

    fn destroy(&self, document: &Document) -> HistoryResult<()> {
        let Some(last) = document.chain.last() else {
            return Ok(());
        };

        let mut data = self.write()?;
        match document.chain.parent() {
            None => {
                if let Some(docs) = data.roots.get_mut(&last.name) {
                    docs.retain(|d| !d.has_id(last.id.as_ref()));
                }
            }
            Some(parent_chain) => {
                let Some(parent) = locate_mut(&mut data.roots, &parent_chain) else {
                    return Ok(());
                };
                let emptied = match parent.embedded.get_mut(&last.name) {
                    Some(Embedded::One(_)) => true,
                    Some(Embedded::Many(children)) => {
                        children.retain(|d| !d.has_id(last.id.as_ref()));
                        false
                    }
                    None => false,
                };
                if emptied {
                    parent.embedded.remove(&last.name);
                }
            }
        }

        debug!(chain = %document.chain, "destroyed document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ModelSchema;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn schema() -> Schema {
        Schema::new()
            .model(
                "Order",
                ModelSchema::new()
                    .embeds_many("lineItems", "LineItem")
                    .embeds_one("address", "Address"),
            )
            .model("LineItem", ModelSchema::new())
            .model("Address", ModelSchema::new())
    }

    fn seeded_store() -> (MemoryStore, Document) {
        let store = MemoryStore::new(schema());
        let order = store
            .insert_root("Order", fields(json!({"_id": 1, "status": "open"})))
            .unwrap();
        store
            .append_embedded_many(&order, "lineItems", &fields(json!({"_id": 5, "sku": "a"})))
            .unwrap();
        store
            .create_embedded_one(&order, "address", &fields(json!({"city": "Oslo"})))
            .unwrap();
        (store, order)
    }

    #[test]
    fn test_find_root_and_embedded() {
        let (store, _) = seeded_store();
        let order = store.find_root("Order", &DocumentId::from(1)).unwrap().unwrap();
        assert_eq!(order.model, "Order");
        assert_eq!(order.get("status"), Some(&json!("open")));

        let items = store.embedded_many(&order, "lineItems").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].model, "LineItem");
        assert_eq!(items[0].id(), Some(DocumentId::from(5)));

        let address = store.embedded_one(&order, "address").unwrap().unwrap();
        assert_eq!(address.model, "Address");
        assert_eq!(address.chain.to_string(), "Order:1/address");

        assert!(store.find_root("Order", &DocumentId::from(2)).unwrap().is_none());
    }

    #[test]
    fn test_embedded_lookup_with_wrong_kind_is_schema_error() {
        let (store, order) = seeded_store();
        let err = store.embedded_one(&order, "lineItems").unwrap_err();
        assert!(err.is_schema_inconsistency());
    }

    #[test]
    fn test_create_root_forces_id() {
        let store = MemoryStore::new(schema());
        let doc = store
            .create_root("Order", &fields(json!({"_id": 7, "total": 3})), &DocumentId::from(7))
            .unwrap();
        assert_eq!(doc.get("_id"), Some(&json!(7)));

        let err = store
            .create_root("Order", &fields(json!({"total": 3})), &DocumentId::from(7))
            .unwrap_err();
        assert!(matches!(err, HistoryError::Store(_)));
        assert_eq!(store.count("Order").unwrap(), 1);
    }

    #[test]
    fn test_append_generates_id() {
        let (store, order) = seeded_store();
        let item = store
            .append_embedded_many(&order, "lineItems", &fields(json!({"sku": "b"})))
            .unwrap();
        assert!(item.id().is_some());
        assert_eq!(store.embedded_many(&order, "lineItems").unwrap().len(), 2);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let (store, order) = seeded_store();

        let updated = store
            .update_attributes(&order, &fields(json!({"status": "closed", "note": "x"})))
            .unwrap();
        assert_eq!(updated.get("status"), Some(&json!("closed")));

        let err = store
            .update_attributes(&order, &fields(json!({"status": "open", "_id": 99})))
            .unwrap_err();
        assert!(matches!(err, HistoryError::Store(_)));
        let current = store.get(&order.chain).unwrap().unwrap();
        assert_eq!(current.get("status"), Some(&json!("closed")));
    }

    #[test]
    fn test_snapshots_render_embedded_documents() {
        let (store, _) = seeded_store();
        let order = store.find_root("Order", &DocumentId::from(1)).unwrap().unwrap();
        assert_eq!(order.get("lineItems"), Some(&json!([{"_id": 5, "sku": "a"}])));
        assert_eq!(order.get("address"), Some(&json!({"city": "Oslo"})));
    }

    #[test]
    fn test_update_replaces_embedded_relation() {
        let (store, order) = seeded_store();
        let items = json!([{"_id": 5, "sku": "b"}, {"_id": 6, "sku": "c"}]);

        let updated = store
            .update_attributes(&order, &fields(json!({"lineItems": items})))
            .unwrap();
        assert_eq!(updated.get("lineItems"), Some(&items));

        let children = store.embedded_many(&order, "lineItems").unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].get("sku"), Some(&json!("b")));
        {
            let data = store.read().unwrap();
            let stored = locate(&data.roots, &order.chain).unwrap();
            assert!(!stored.attributes.contains_key("lineItems"));
        }

        store
            .update_attributes(&order, &fields(json!({"address": null})))
            .unwrap();
        assert!(store.embedded_one(&order, "address").unwrap().is_none());
    }

    #[test]
    fn test_bad_relation_value_changes_nothing() {
        let (store, order) = seeded_store();
        let err = store
            .update_attributes(&order, &fields(json!({"status": "closed", "lineItems": [1]})))
            .unwrap_err();
        assert!(matches!(err, HistoryError::Store(_)));

        let current = store.get(&order.chain).unwrap().unwrap();
        assert_eq!(current.get("status"), Some(&json!("open")));
        assert_eq!(store.embedded_many(&order, "lineItems").unwrap().len(), 1);
    }

    #[test]
    fn test_create_root_builds_embedded_documents() {
        let store = MemoryStore::new(schema());
        let attributes = fields(json!({
            "_id": 1,
            "lineItems": [{"_id": 5, "sku": "a"}],
            "address": {"city": "Oslo"}
        }));
        let order = store
            .create_root("Order", &attributes, &DocumentId::from(1))
            .unwrap();

        assert_eq!(store.embedded_many(&order, "lineItems").unwrap().len(), 1);
        let address = store.embedded_one(&order, "address").unwrap().unwrap();
        assert_eq!(address.get("city"), Some(&json!("Oslo")));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (store, order) = seeded_store();
        let item = store.embedded_many(&order, "lineItems").unwrap().remove(0);

        store.destroy(&item).unwrap();
        store.destroy(&item).unwrap();
        assert!(store.embedded_many(&order, "lineItems").unwrap().is_empty());

        let address = store.embedded_one(&order, "address").unwrap().unwrap();
        store.destroy(&address).unwrap();
        assert!(store.embedded_one(&order, "address").unwrap().is_none());

        store.destroy(&order).unwrap();
        store.destroy(&order).unwrap();
        assert_eq!(store.count("Order").unwrap(), 0);
        store.destroy(&item).unwrap();
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("documents.json");

        let store = MemoryStore::open(path.clone(), schema()).unwrap();
        let order = store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        store
            .append_embedded_many(&order, "lineItems", &fields(json!({"_id": 5})))
            .unwrap();
        store.save().unwrap();

        let reloaded = MemoryStore::open(path, schema()).unwrap();
        let order = reloaded.find_root("Order", &DocumentId::from(1)).unwrap().unwrap();
        assert_eq!(reloaded.embedded_many(&order, "lineItems").unwrap().len(), 1);
    }

    #[test]
    fn test_save_without_path_fails() {
        let store = MemoryStore::new(schema());
        assert!(matches!(store.save().unwrap_err(), HistoryError::Config(_)));
    }
}
