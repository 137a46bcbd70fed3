//! Undo/redo dispatch for single audit records
//!
//! | action  | undo                 | redo                 |
//! |---------|----------------------|----------------------|
//! | create  | destroy trackable    | re-create trackable  |
//! | destroy | re-create trackable  | destroy again        |
//! | update  | apply undo patch     | apply redo patch     |

use serde_json::Value;
use tracing::info;

use super::resolver::ChainResolver;
use crate::audit::{affected, build_patch_for, Action, AuditRecord, Direction};
use crate::error::{HistoryError, HistoryResult};
use crate::models::{Document, DocumentId, Fields, ID_FIELD};
use crate::storage::{DocumentStore, RelationKind};

/// What replaying a record did to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The trackable was inserted again
    Recreated(Document),
    /// The trackable was removed
    Destroyed,
    /// The trackable was already gone; nothing to remove
    AlreadyAbsent,
    /// The trackable's attributes were patched
    Patched(Document),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Recreated(doc) => write!(f, "re-created {}", doc.chain),
            Outcome::Destroyed => write!(f, "destroyed"),
            Outcome::AlreadyAbsent => write!(f, "already absent"),
            Outcome::Patched(doc) => write!(f, "patched {}", doc.chain),
        }
    }
}

/// Replays audit records against a document store
pub struct ActionDispatcher<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    modifier_field: Option<String>,
}

impl<'a, S: DocumentStore + ?Sized> ActionDispatcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            modifier_field: None,
        }
    }

    /// Field that receives the modifier on patched documents
    pub fn with_modifier_field(mut self, field: impl Into<String>) -> Self {
        self.modifier_field = Some(field.into());
        self
    }

    fn resolver(&self) -> ChainResolver<'a, S> {
        ChainResolver::new(self.store)
    }

    /// Revert the change `record` describes
    pub fn undo(&self, record: &AuditRecord, modifier: Option<&Value>) -> HistoryResult<Outcome> {
        self.dispatch(record, Direction::Undo, modifier)
    }

    /// Re-apply the change `record` describes
    pub fn redo(&self, record: &AuditRecord, modifier: Option<&Value>) -> HistoryResult<Outcome> {
        self.dispatch(record, Direction::Redo, modifier)
    }

    pub fn dispatch(
        &self,
        record: &AuditRecord,
        direction: Direction,
        modifier: Option<&Value>,
    ) -> HistoryResult<Outcome> {
        let outcome = match (record.action, direction) {
            (Action::Create, Direction::Undo) | (Action::Destroy, Direction::Redo) => {
                self.redestroy(record)?
            }
            (Action::Create, Direction::Redo) | (Action::Destroy, Direction::Undo) => {
                Outcome::Recreated(self.recreate(record)?)
            }
            (Action::Update, direction) => {
                Outcome::Patched(self.apply_patch(record, direction, modifier)?)
            }
        };

        info!(
            chain = %record.association_chain,
            version = record.version,
            action = %record.action,
            %direction,
            %outcome,
            "replayed audit record"
        );
        Ok(outcome)
    }

    fn recreate(&self, record: &AuditRecord) -> HistoryResult<Document> {
        let chain = &record.association_chain;
        let node = chain
            .last()
            .ok_or_else(|| HistoryError::Validation("Association chain cannot be empty".into()))?;
        let attributes = record.recreate_attributes();

        let Some(parent_chain) = chain.parent() else {
            let id = attributes
                .get(ID_FIELD)
                .and_then(DocumentId::from_value)
                .or_else(|| node.id.clone())
                .ok_or_else(|| {
                    HistoryError::Validation(format!("Cannot re-create {} without an id", chain))
                })?;
            return self.store.create_root(&node.name, attributes, &id);
        };

        let parent = self
            .resolver()
            .trackable(&parent_chain)?
            .ok_or_else(|| HistoryError::TrackableMissing(parent_chain.to_string()))?;

        match self.store.relation_kind(&parent, &node.name) {
            RelationKind::EmbedOne => {
                self.store
                    .create_embedded_one(&parent, &node.name, attributes)
            }
            RelationKind::EmbedMany => {
                let attributes = restore_chain_id(attributes, node.id.as_ref());
                self.store
                    .append_embedded_many(&parent, &node.name, &attributes)
            }
            RelationKind::None => Err(HistoryError::schema_inconsistency(
                &node.name,
                &parent.model,
            )),
        }
    }

    fn redestroy(&self, record: &AuditRecord) -> HistoryResult<Outcome> {
        match self.resolver().trackable(&record.association_chain)? {
            Some(trackable) => {
                self.store.destroy(&trackable)?;
                Ok(Outcome::Destroyed)
            }
            None => Ok(Outcome::AlreadyAbsent),
        }
    }

    fn apply_patch(
        &self,
        record: &AuditRecord,
        direction: Direction,
        modifier: Option<&Value>,
    ) -> HistoryResult<Document> {
        let trackable = self
            .resolver()
            .trackable(&record.association_chain)?
            .ok_or_else(|| HistoryError::TrackableMissing(record.association_chain.to_string()))?;

        let base = affected(&record.original, &record.modified, Some(&trackable.attributes));
        let patch = build_patch_for(
            direction,
            &base,
            &record.original,
            &record.modified,
            modifier,
            self.modifier_field.as_deref(),
        );

        self.store.update_attributes(&trackable, &patch)
    }
}

/// Carry the chain's id into attributes that lost their `_id`
fn restore_chain_id(attributes: &Fields, id: Option<&DocumentId>) -> Fields {
    let mut attributes = attributes.clone();
    if let Some(id) = id {
        if !attributes.contains_key(ID_FIELD) {
            attributes.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssociationChain, ChainNode};
    use crate::storage::{MemoryStore, ModelSchema, Schema};
    use serde_json::json;

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

    fn order_chain() -> AssociationChain {
        AssociationChain::root("Order", 1)
    }

    fn item_chain() -> AssociationChain {
        order_chain().child(ChainNode::new("lineItems", 5))
    }

    #[test]
    fn test_redo_destroy_is_noop_when_absent_and_undo_recreates() {
        let store = MemoryStore::new(schema());
        let snapshot = fields(json!({"_id": 1, "total": 100}));
        let record = AuditRecord::destroy(order_chain(), 2, None, snapshot);
        let dispatcher = ActionDispatcher::new(&store);

        assert_eq!(dispatcher.redo(&record, None).unwrap(), Outcome::AlreadyAbsent);

        let outcome = dispatcher.undo(&record, None).unwrap();
        assert!(matches!(outcome, Outcome::Recreated(_)));
        let order = store.get(&order_chain()).unwrap().unwrap();
        assert_eq!(order.get("total"), Some(&json!(100)));
        assert_eq!(order.id(), Some(DocumentId::from(1)));

        assert_eq!(dispatcher.redo(&record, None).unwrap(), Outcome::Destroyed);
        assert!(store.get(&order_chain()).unwrap().is_none());
    }

    #[test]
    fn test_undo_destroy_uses_modified_snapshot() {
        let store = MemoryStore::new(schema());
        let mut record = AuditRecord::destroy(order_chain(), 2, None, Fields::new());
        record.modified = fields(json!({"_id": 1, "total": 100}));

        ActionDispatcher::new(&store).undo(&record, None).unwrap();

        let order = store.get(&order_chain()).unwrap().unwrap();
        assert_eq!(order.get("_id"), Some(&json!(1)));
        assert_eq!(order.get("total"), Some(&json!(100)));
    }

    #[test]
    fn test_create_record_round_trip() {
        let store = MemoryStore::new(schema());
        store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        let attributes = fields(json!({"_id": 5, "sku": "a"}));
        let record = AuditRecord::create(item_chain(), 1, None, attributes);
        let dispatcher = ActionDispatcher::new(&store);

        assert!(matches!(dispatcher.redo(&record, None).unwrap(), Outcome::Recreated(_)));
        assert_eq!(
            store.get(&item_chain()).unwrap().unwrap().get("sku"),
            Some(&json!("a"))
        );

        assert_eq!(dispatcher.undo(&record, None).unwrap(), Outcome::Destroyed);
        assert!(store.get(&item_chain()).unwrap().is_none());
    }

    #[test]
    fn test_recreate_embedded_one() {
        let store = MemoryStore::new(schema());
        store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        let chain = order_chain().child(ChainNode::embedded_one("address"));
        let record = AuditRecord::destroy(chain.clone(), 3, None, fields(json!({"city": "Oslo"})));

        ActionDispatcher::new(&store).undo(&record, None).unwrap();
        assert_eq!(
            store.get(&chain).unwrap().unwrap().get("city"),
            Some(&json!("Oslo"))
        );
    }

    #[test]
    fn test_recreate_embedded_restores_chain_id() {
        let store = MemoryStore::new(schema());
        store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        let record = AuditRecord::destroy(item_chain(), 3, None, fields(json!({"sku": "a"})));

        ActionDispatcher::new(&store).undo(&record, None).unwrap();
        assert!(store.get(&item_chain()).unwrap().is_some());
    }

    #[test]
    fn test_recreate_without_parent_fails() {
        let store = MemoryStore::new(schema());
        let record = AuditRecord::destroy(item_chain(), 3, None, fields(json!({"_id": 5})));
        let err = ActionDispatcher::new(&store).undo(&record, None).unwrap_err();
        assert!(err.is_trackable_missing());
    }

    #[test]
    fn test_recreate_under_undeclared_relation_fails() {
        let store = MemoryStore::new(schema());
        store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        let chain = order_chain().child(ChainNode::new("payments", 3));
        let record = AuditRecord::destroy(chain, 2, None, fields(json!({"_id": 3})));

        let err = ActionDispatcher::new(&store).undo(&record, None).unwrap_err();
        assert!(err.is_schema_inconsistency());
    }

    #[test]
    fn test_undo_update_leaves_other_fields() {
        let store = MemoryStore::new(schema());
        store
            .insert_root("Order", fields(json!({"_id": 1, "status": "closed", "total": 100})))
            .unwrap();
        let record = AuditRecord::update(
            order_chain(),
            2,
            Some(json!("alice")),
            fields(json!({"status": "open"})),
            fields(json!({"status": "closed"})),
        );

        let dispatcher = ActionDispatcher::new(&store).with_modifier_field("modifier_id");
        dispatcher.undo(&record, Some(&json!("bob"))).unwrap();

        let order = store.get(&order_chain()).unwrap().unwrap();
        assert_eq!(order.get("status"), Some(&json!("open")));
        assert_eq!(order.get("total"), Some(&json!(100)));
        assert_eq!(order.get("modifier_id"), Some(&json!("bob")));

        dispatcher.redo(&record, Some(&json!("bob"))).unwrap();
        let order = store.get(&order_chain()).unwrap().unwrap();
        assert_eq!(order.get("status"), Some(&json!("closed")));
    }

    #[test]
    fn test_undo_update_of_embedded_collection() {
        let store = MemoryStore::new(schema());
        let order = store.insert_root("Order", fields(json!({"_id": 1}))).unwrap();
        store
            .append_embedded_many(&order, "lineItems", &fields(json!({"_id": 5, "qty": 2})))
            .unwrap();
        let record = AuditRecord::update(
            order_chain(),
            2,
            None,
            fields(json!({"lineItems": [{"_id": 5, "qty": 1}]})),
            fields(json!({"lineItems": [{"_id": 5, "qty": 2}]})),
        );
        let dispatcher = ActionDispatcher::new(&store);

        dispatcher.undo(&record, None).unwrap();
        let item = store.get(&item_chain()).unwrap().unwrap();
        assert_eq!(item.get("qty"), Some(&json!(1)));
        assert_eq!(store.embedded_many(&order, "lineItems").unwrap().len(), 1);

        dispatcher.redo(&record, None).unwrap();
        let item = store.get(&item_chain()).unwrap().unwrap();
        assert_eq!(item.get("qty"), Some(&json!(2)));
    }

    #[test]
    fn test_update_on_missing_trackable_fails() {
        let store = MemoryStore::new(schema());
        let record = AuditRecord::update(
            order_chain(),
            2,
            None,
            fields(json!({"status": "open"})),
            fields(json!({"status": "closed"})),
        );

        let err = ActionDispatcher::new(&store).undo(&record, None).unwrap_err();
        assert!(err.is_trackable_missing());
    }
}
