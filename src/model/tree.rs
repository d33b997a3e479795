use super::category::Category;
use super::node::ModelNode;
use super::path::{NodePath, PathSegment};
use super::property::ModelProperty;
use super::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// An immutable desired-state or previously-applied-state tree.
///
/// Nodes live in an arena keyed by absolute path; `root_path` marks the
/// fragment root, so a model may describe a subtree of a larger store.
/// Models are produced once, by a loader or a [`TreeModelBuilder`], and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeModel {
    root_path: NodePath,
    nodes: BTreeMap<NodePath, ModelNode>,
}

impl TreeModel {
    pub fn root_path(&self) -> &NodePath {
        &self.root_path
    }

    pub fn root(&self) -> &ModelNode {
        self.nodes
            .get(&self.root_path)
            .expect("builder guarantees a root node")
    }

    pub fn node(&self, path: &NodePath) -> Option<&ModelNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in path order
    pub fn iter(&self) -> impl Iterator<Item = (&NodePath, &ModelNode)> {
        self.nodes.iter()
    }

    /// Smallest useful model: a bare root node
    pub fn minimal(root_path: NodePath, primary_type: &str) -> Self {
        TreeModelBuilder::new(root_path, primary_type).build()
    }
}

/// Builder for [`TreeModel`], the only way to assemble one in-process.
///
/// Child order is insertion order; same-name siblings get contiguous
/// 1-based indices as they are added.
#[derive(Debug)]
pub struct TreeModelBuilder {
    root_path: NodePath,
    nodes: BTreeMap<NodePath, ModelNode>,
}

impl TreeModelBuilder {
    pub fn new(root_path: NodePath, primary_type: &str) -> Self {
        let (name, index) = match root_path.last() {
            Some(seg) => (seg.name().to_string(), seg.index()),
            None => (String::new(), 1),
        };
        let mut nodes = BTreeMap::new();
        nodes.insert(root_path.clone(), ModelNode::new(&name, index, primary_type));
        Self { root_path, nodes }
    }

    pub fn root_path(&self) -> &NodePath {
        &self.root_path
    }

    /// Add a child under `parent`, assigning the next sibling index for
    /// its name. Returns the new node's path.
    pub fn add_node(
        &mut self,
        parent: &NodePath,
        name: &str,
        primary_type: &str,
    ) -> Result<NodePath, ModelError> {
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| ModelError::NodeNotFound(parent.clone()))?;
        let index = parent_node
            .children
            .iter()
            .filter(|s| s.name() == name)
            .count() as u32
            + 1;
        let segment = PathSegment::new(name, index)?;
        parent_node.children.push(segment.clone());
        let path = parent.join(&segment);
        self.nodes
            .insert(path.clone(), ModelNode::new(name, index, primary_type));
        Ok(path)
    }

    /// Add or replace a property on the node at `path`
    pub fn add_property(
        &mut self,
        path: &NodePath,
        property: ModelProperty,
    ) -> Result<(), ModelError> {
        let node = self.node_mut(path)?;
        node.properties.retain(|p| p.name != property.name);
        node.properties.push(property);
        Ok(())
    }

    pub fn remove_property(&mut self, path: &NodePath, name: &str) -> Result<(), ModelError> {
        self.node_mut(path)?.properties.retain(|p| p.name != name);
        Ok(())
    }

    pub fn add_mixin(&mut self, path: &NodePath, mixin: &str) -> Result<(), ModelError> {
        self.node_mut(path)?.mixins.insert(mixin.to_string());
        Ok(())
    }

    pub fn remove_mixin(&mut self, path: &NodePath, mixin: &str) -> Result<(), ModelError> {
        self.node_mut(path)?.mixins.remove(mixin);
        Ok(())
    }

    pub fn set_primary_type(&mut self, path: &NodePath, primary_type: &str) -> Result<(), ModelError> {
        self.node_mut(path)?.primary_type = primary_type.to_string();
        Ok(())
    }

    pub fn set_category(&mut self, path: &NodePath, category: Category) -> Result<(), ModelError> {
        self.node_mut(path)?.category = category;
        Ok(())
    }

    pub fn set_identity(&mut self, path: &NodePath, identity: Uuid) -> Result<(), ModelError> {
        self.node_mut(path)?.identity = Some(identity);
        Ok(())
    }

    pub fn set_origin(&mut self, path: &NodePath, origin: &str) -> Result<(), ModelError> {
        self.node_mut(path)?.origin = Some(origin.to_string());
        Ok(())
    }

    pub fn set_ignore_ordering(&mut self, path: &NodePath, ignore: bool) -> Result<(), ModelError> {
        self.node_mut(path)?.ignore_ordering = ignore;
        Ok(())
    }

    pub fn set_order_before(
        &mut self,
        path: &NodePath,
        anchor: Option<PathSegment>,
    ) -> Result<(), ModelError> {
        self.node_mut(path)?.order_before = anchor;
        Ok(())
    }

    pub fn node(&self, path: &NodePath) -> Option<&ModelNode> {
        self.nodes.get(path)
    }

    pub fn build(self) -> TreeModel {
        TreeModel {
            root_path: self.root_path,
            nodes: self.nodes,
        }
    }

    fn node_mut(&mut self, path: &NodePath) -> Result<&mut ModelNode, ModelError> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| ModelError::NodeNotFound(path.clone()))
    }
}
