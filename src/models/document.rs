//! Document snapshots handed out by a document store

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chain::AssociationChain;
use super::ids::DocumentId;

/// Field name to value map, the unit every diff and patch works on
pub type Fields = Map<String, Value>;

/// Name of the identity field inside a document's attributes
pub const ID_FIELD: &str = "_id";

/// A snapshot of a live document
///
/// Carries its model name (used for schema lookups), the chain that locates
/// it inside its root document, and its attributes at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub model: String,
    pub chain: AssociationChain,
    pub attributes: Fields,
}

impl Document {
    pub fn new(model: impl Into<String>, chain: AssociationChain, attributes: Fields) -> Self {
        Self {
            model: model.into(),
            chain,
            attributes,
        }
    }

    /// The document's id, read from `_id`
    pub fn id(&self) -> Option<DocumentId> {
        self.attributes.get(ID_FIELD).and_then(DocumentId::from_value)
    }

    /// Read a single attribute
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }
}
