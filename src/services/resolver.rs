//! Association chain resolution
//!
//! Walks a chain hop by hop against a document store and returns the live
//! document at every hop, root first.

use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult};
use crate::models::{AssociationChain, Document};
use crate::storage::{DocumentStore, RelationKind};

/// Live documents along an association chain, root first
///
/// Entries are `None` from the first hop whose document no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChain {
    documents: Vec<Option<Document>>,
}

impl ResolvedChain {
    pub fn documents(&self) -> &[Option<Document>] {
        &self.documents
    }

    pub fn root(&self) -> Option<&Document> {
        self.documents.first().and_then(Option::as_ref)
    }

    /// The tracked document itself
    pub fn trackable(&self) -> Option<&Document> {
        self.documents.last().and_then(Option::as_ref)
    }

    /// The trackable's parent; always `None` for root-level chains
    pub fn parent(&self) -> Option<&Document> {
        let len = self.documents.len();
        if len < 2 {
            return None;
        }
        self.documents[len - 2].as_ref()
    }

    pub fn into_trackable(mut self) -> Option<Document> {
        self.documents.pop().flatten()
    }
}

/// Resolves association chains against a document store
pub struct ChainResolver<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> ChainResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve every hop of `chain`
    ///
    /// A hop naming something other than an embedded relation fails with
    /// `SchemaInconsistency`: the schema no longer matches the recorded
    /// chain.
    pub fn resolve(&self, chain: &AssociationChain) -> HistoryResult<ResolvedChain> {
        let nodes = chain.nodes();
        if nodes.is_empty() {
            return Err(HistoryError::Validation(
                "Association chain cannot be empty".into(),
            ));
        }

        let mut documents: Vec<Option<Document>> = Vec::with_capacity(nodes.len());

        for (idx, node) in nodes.iter().enumerate() {
            let resolved = if idx == 0 {
                match &node.id {
                    Some(id) => self.store.find_root(&node.name, id)?,
                    None => {
                        return Err(HistoryError::Validation(format!(
                            "Root hop '{}' has no id",
                            node.name
                        )))
                    }
                }
            } else {
                match documents[idx - 1].as_ref() {
                    // An ancestor is gone, so is everything below it
                    None => None,
                    Some(current) => match self.store.relation_kind(current, &node.name) {
                        RelationKind::EmbedOne => self.store.embedded_one(current, &node.name)?,
                        RelationKind::EmbedMany => {
                            let id = node.id.as_ref().ok_or_else(|| {
                                HistoryError::Validation(format!(
                                    "Embed-many hop '{}' in {} has no id",
                                    node.name, chain
                                ))
                            })?;
                            self.store
                                .embedded_many(current, &node.name)?
                                .into_iter()
                                .find(|d| d.id().as_ref() == Some(id))
                        }
                        RelationKind::None => {
                            warn!(
                                %chain,
                                relation = %node.name,
                                model = %current.model,
                                "chain no longer matches schema"
                            );
                            return Err(HistoryError::schema_inconsistency(
                                &node.name,
                                &current.model,
                            ));
                        }
                    },
                }
            };

            if resolved.is_none() {
                debug!(%chain, hop = idx, "hop did not resolve to a live document");
            }
            documents.push(resolved);
        }

        Ok(ResolvedChain { documents })
    }

    /// The live trackable at the end of `chain`, if it still exists
    pub fn trackable(&self, chain: &AssociationChain) -> HistoryResult<Option<Document>> {
        Ok(self.resolve(chain)?.into_trackable())
    }

    /// The live parent of the trackable at the end of `chain`
    pub fn parent(&self, chain: &AssociationChain) -> HistoryResult<Option<Document>> {
        match chain.parent() {
            Some(parent_chain) => self.trackable(&parent_chain),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChainNode, DocumentId, Fields};
    use crate::storage::{MemoryStore, ModelSchema, Schema};
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn store() -> MemoryStore {
        let schema = Schema::new()
            .model(
                "Order",
                ModelSchema::new()
                    .embeds_many("lineItems", "LineItem")
                    .embeds_one("address", "Address"),
            )
            .model("LineItem", ModelSchema::new().embeds_one("discount", "Discount"))
            .model("Address", ModelSchema::new())
            .model("Discount", ModelSchema::new());
        let store = MemoryStore::new(schema);
        let order = store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        let item = store
            .append_embedded_many(&order, "lineItems", &fields(json!({"_id": 5, "sku": "a"})))
            .unwrap();
        store
            .create_embedded_one(&item, "discount", &fields(json!({"pct": 10})))
            .unwrap();
        store
    }

    #[test]
    fn test_resolve_embed_many() {
        let store = store();
        let chain = AssociationChain::root("Order", 1).child(ChainNode::new("lineItems", 5));

        let resolved = ChainResolver::new(&store).resolve(&chain).unwrap();

        assert_eq!(resolved.documents().len(), 2);
        assert_eq!(resolved.root().unwrap().model, "Order");
        assert_eq!(resolved.root().unwrap().id(), Some(DocumentId::from(1)));
        let item = resolved.trackable().unwrap();
        assert_eq!(item.model, "LineItem");
        assert_eq!(item.id(), Some(DocumentId::from(5)));
        assert_eq!(resolved.parent(), resolved.root());
    }

    #[test]
    fn test_resolve_nested_embed_one() {
        let store = store();
        let chain: AssociationChain = "Order:1/lineItems:5/discount".parse().unwrap();
        let resolved = ChainResolver::new(&store).resolve(&chain).unwrap();
        assert_eq!(resolved.trackable().unwrap().get("pct"), Some(&json!(10)));
        assert_eq!(resolved.parent().unwrap().model, "LineItem");
    }

    #[test]
    fn test_root_level_chain_has_no_parent() {
        let store = store();
        let resolved = ChainResolver::new(&store)
            .resolve(&AssociationChain::root("Order", 1))
            .unwrap();
        assert!(resolved.trackable().is_some());
        assert!(resolved.parent().is_none());
    }

    #[test]
    fn test_deleted_ancestor_propagates_none() {
        let store = store();
        let chain: AssociationChain = "Order:2/lineItems:5/discount".parse().unwrap();
        let resolved = ChainResolver::new(&store).resolve(&chain).unwrap();
        assert_eq!(resolved.documents().len(), 3);
        assert!(resolved.documents().iter().all(Option::is_none));

        let chain: AssociationChain = "Order:1/lineItems:6/discount".parse().unwrap();
        let resolved = ChainResolver::new(&store).resolve(&chain).unwrap();
        assert!(resolved.root().is_some());
        assert!(resolved.trackable().is_none());
    }

    #[test]
    fn test_unknown_relation_is_schema_inconsistency() {
        let store = store();
        let chain: AssociationChain = "Order:1/payments:3".parse().unwrap();
        let err = ChainResolver::new(&store).resolve(&chain).unwrap_err();
        assert!(err.is_schema_inconsistency());
    }
}
