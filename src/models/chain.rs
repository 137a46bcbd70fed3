//! Association chains
//!
//! An association chain is the path from a root document down through
//! embedded relations to a tracked document. The first node names the root
//! document's type, every following node names an embedded relation on the
//! preceding document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::DocumentId;
use crate::error::{HistoryError, HistoryResult};

/// One hop in an association chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainNode {
    /// Root type name for the first node, relation name afterwards
    pub name: String,

    /// Document id; absent for embed-one hops
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
}

impl ChainNode {
    /// A hop that identifies its document by id (roots and embed-many)
    pub fn new(name: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self {
            name: name.into(),
            id: Some(id.into()),
        }
    }

    /// An embed-one hop
    pub fn embedded_one(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

impl fmt::Display for ChainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{}", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Ordered root-first path to a trackable document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<ChainNode>", into = "Vec<ChainNode>")]
pub struct AssociationChain(Vec<ChainNode>);

impl AssociationChain {
    /// Create a chain, rejecting an empty node list
    pub fn new(nodes: Vec<ChainNode>) -> HistoryResult<Self> {
        if nodes.is_empty() {
            return Err(HistoryError::Validation(
                "Association chain cannot be empty".into(),
            ));
        }
        Ok(Self(nodes))
    }

    /// Chain of a root-level document
    pub fn root(name: impl Into<String>, id: impl Into<DocumentId>) -> Self {
        Self(vec![ChainNode::new(name, id)])
    }

    /// Extend the chain by one hop
    pub fn child(&self, node: ChainNode) -> Self {
        let mut nodes = self.0.clone();
        nodes.push(node);
        Self(nodes)
    }

    pub fn nodes(&self) -> &[ChainNode] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The root document's hop
    pub fn first(&self) -> Option<&ChainNode> {
        self.0.first()
    }

    /// The trackable's own hop
    pub fn last(&self) -> Option<&ChainNode> {
        self.0.last()
    }

    /// True when the trackable is itself a root document
    pub fn is_root_level(&self) -> bool {
        self.0.len() == 1
    }

    /// The chain of the trackable's parent, if it has one
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Root type name, used as the record scope
    pub fn scope(&self) -> Option<&str> {
        self.first().map(|n| n.name.as_str())
    }
}

impl TryFrom<Vec<ChainNode>> for AssociationChain {
    type Error = HistoryError;

    fn try_from(nodes: Vec<ChainNode>) -> Result<Self, Self::Error> {
        Self::new(nodes)
    }
}

impl From<AssociationChain> for Vec<ChainNode> {
    fn from(chain: AssociationChain) -> Self {
        chain.0
    }
}

impl fmt::Display for AssociationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

impl FromStr for AssociationChain {
    type Err = HistoryError;

    /// Parse `Order:1/lineItems:5/address` style paths
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut nodes = Vec::new();
        for (idx, part) in s.split('/').enumerate() {
            let part = part.trim();
            if part.is_empty() {
                return Err(HistoryError::Validation(format!(
                    "Empty hop in association chain '{}'",
                    s
                )));
            }
            let node = match part.split_once(':') {
                Some((name, id)) if !name.is_empty() && !id.is_empty() => {
                    ChainNode::new(name, id)
                }
                Some(_) => {
                    return Err(HistoryError::Validation(format!(
                        "Malformed hop '{}' in association chain",
                        part
                    )))
                }
                None => ChainNode::embedded_one(part),
            };
            if idx == 0 && node.id.is_none() {
                return Err(HistoryError::Validation(format!(
                    "Root hop '{}' needs an id",
                    part
                )));
            }
            nodes.push(node);
        }
        Self::new(nodes)
    }
}
