use super::category::Category;
use super::path::PathSegment;
use super::property::ModelProperty;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A node in a [`TreeModel`](super::TreeModel).
///
/// Identity within the parent is (name, 1-based sibling index). Children
/// are stored as an ordered segment sequence; the nodes themselves live
/// in the model's path-addressed arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelNode {
    pub name: String,
    pub index: u32,
    pub primary_type: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub mixins: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ModelProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PathSegment>,
    /// Fixed identity the live node must be created with, when pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Uuid>,
    /// Diagnostic provenance, e.g. the definition source this came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Suppress child order reconciliation beneath this node
    #[serde(default)]
    pub ignore_ordering: bool,
    #[serde(default)]
    pub category: Category,
    /// Ordering hint emitted by export: this node belongs immediately
    /// before the named sibling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_before: Option<PathSegment>,
}

impl ModelNode {
    pub(crate) fn new(name: &str, index: u32, primary_type: &str) -> Self {
        Self {
            name: name.to_string(),
            index,
            primary_type: primary_type.to_string(),
            mixins: BTreeSet::new(),
            properties: Vec::new(),
            children: Vec::new(),
            identity: None,
            origin: None,
            ignore_ordering: false,
            category: Category::default(),
            order_before: None,
        }
    }

    /// Find a property by name
    pub fn property(&self, name: &str) -> Option<&ModelProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The segment this node occupies under its parent
    pub fn segment(&self) -> PathSegment {
        PathSegment::unchecked(&self.name, self.index)
    }
}
