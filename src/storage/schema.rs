//! Model declarations
//!
//! A schema names each model, which of its fields are tracked, and the
//! embedded relations it holds. It is what the diff layer asks whether a
//! field is tracked and what the store asks whether a relation embeds one
//! document or many.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};
use crate::models::AssociationChain;

/// How a relation embeds its documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    EmbedOne,
    EmbedMany,
    /// Not an embedded relation (undeclared, or a plain field)
    None,
}

/// An embedded relation of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    /// Model of the embedded documents
    pub model: String,
    /// Whether changes to the relation show up in parent change sets
    #[serde(default = "default_true")]
    pub tracked: bool,
}

fn default_true() -> bool {
    true
}

/// Which fields of a model are tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldSelection {
    #[default]
    All,
    Only(Vec<String>),
}

/// Tracking declaration of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    #[serde(default)]
    pub on: FieldSelection,

    /// Fields never tracked, even when `on` selects them
    #[serde(default = "default_except")]
    pub except: Vec<String>,

    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

fn default_except() -> Vec<String> {
    vec!["created_at".to_string(), "updated_at".to_string()]
}

impl Default for ModelSchema {
    fn default() -> Self {
        Self {
            on: FieldSelection::default(),
            except: default_except(),
            relations: BTreeMap::new(),
        }
    }
}

impl ModelSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track only the listed fields
    pub fn only(mut self, fields: &[&str]) -> Self {
        self.on = FieldSelection::Only(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Never track the listed fields
    pub fn except(mut self, fields: &[&str]) -> Self {
        self.except = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Declare an embed-one relation
    pub fn embeds_one(mut self, name: &str, model: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            Relation {
                kind: RelationKind::EmbedOne,
                model: model.to_string(),
                tracked: true,
            },
        );
        self
    }

    /// Declare an embed-many relation
    pub fn embeds_many(mut self, name: &str, model: &str) -> Self {
        self.relations.insert(
            name.to_string(),
            Relation {
                kind: RelationKind::EmbedMany,
                model: model.to_string(),
                tracked: true,
            },
        );
        self
    }

    fn selects(&self, field: &str) -> bool {
        match &self.on {
            FieldSelection::All => true,
            FieldSelection::Only(fields) => fields.iter().any(|f| f == field),
        }
    }
}

/// Fields that carry bookkeeping rather than document state
const RESERVED_FIELDS: &[&str] = &["_id", "_type"];

/// Declarations of every known model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schema {
    #[serde(default)]
    pub models: BTreeMap<String, ModelSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a model
    pub fn model(mut self, name: &str, model: ModelSchema) -> Self {
        self.models.insert(name.to_string(), model);
        self
    }

    pub fn get(&self, model: &str) -> Option<&ModelSchema> {
        self.models.get(model)
    }

    /// Whether changes to `field` of `model` are tracked
    ///
    /// Undeclared models track nothing. Embedded relations follow their own
    /// `tracked` flag in addition to the field selection.
    pub fn is_tracked_field(&self, model: &str, field: &str) -> bool {
        let Some(schema) = self.models.get(model) else {
            return false;
        };
        if RESERVED_FIELDS.contains(&field) || schema.except.iter().any(|f| f == field) {
            return false;
        }
        if let Some(relation) = schema.relations.get(field) {
            if !relation.tracked {
                return false;
            }
        }
        schema.selects(field)
    }

    /// Whether `field` of `model` is a tracked embed-many relation
    pub fn tracked_embeds_many(&self, model: &str, field: &str) -> bool {
        self.relation(model, field)
            .is_some_and(|r| r.kind == RelationKind::EmbedMany && r.tracked)
            && self.is_tracked_field(model, field)
    }

    pub fn relation(&self, model: &str, name: &str) -> Option<&Relation> {
        self.models.get(model).and_then(|m| m.relations.get(name))
    }

    pub fn relation_kind(&self, model: &str, name: &str) -> RelationKind {
        self.relation(model, name)
            .map(|r| r.kind)
            .unwrap_or(RelationKind::None)
    }

    /// Model of the trackable at the end of `chain`
    pub fn model_for_chain(&self, chain: &AssociationChain) -> HistoryResult<String> {
        let mut nodes = chain.nodes().iter();
        let root = nodes
            .next()
            .ok_or_else(|| HistoryError::Validation("Association chain cannot be empty".into()))?;

        let mut model = root.name.clone();
        for node in nodes {
            model = self
                .relation(&model, &node.name)
                .map(|r| r.model.clone())
                .ok_or_else(|| HistoryError::schema_inconsistency(&node.name, &model))?;
        }
        Ok(model)
    }
}
