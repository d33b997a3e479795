use crate::model::{NodePath, PathSegment, PropertyState};
use thiserror::Error;
use uuid::Uuid;

/// Lock state of a live node, as held by some other session.
///
/// A shallow lock covers one node; a deep lock covers its whole subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Shallow,
    Deep,
}

/// Access failure against the live store
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodePath),

    #[error("No child {segment} under {parent}")]
    ChildNotFound {
        parent: NodePath,
        segment: PathSegment,
    },

    #[error("Access to live store failed: {0}")]
    AccessFailed(String),
}

/// Abstraction over the live, mutable content tree.
///
/// All mutation is staged: nothing is durable until [`commit`] is called,
/// and [`refresh`] with `keep_changes = false` discards everything staged
/// since the last commit. The engine never commits on its own.
///
/// [`commit`]: TargetAdapter::commit
/// [`refresh`]: TargetAdapter::refresh
pub trait TargetAdapter {
    fn node_exists(&self, path: &NodePath) -> Result<bool, TargetError>;

    /// Identity of the node at `path`, or `None` if the path is absent
    fn node_id(&self, path: &NodePath) -> Result<Option<Uuid>, TargetError>;

    /// Path of the node carrying `id`, or `None` if no node does
    fn path_by_id(&self, id: &Uuid) -> Result<Option<NodePath>, TargetError>;

    fn primary_type(&self, path: &NodePath) -> Result<String, TargetError>;

    fn set_primary_type(&mut self, path: &NodePath, primary_type: &str)
        -> Result<(), TargetError>;

    fn mixins(&self, path: &NodePath) -> Result<std::collections::BTreeSet<String>, TargetError>;

    fn add_mixin(&mut self, path: &NodePath, mixin: &str) -> Result<(), TargetError>;

    fn remove_mixin(&mut self, path: &NodePath, mixin: &str) -> Result<(), TargetError>;

    /// Create a child under `parent`, optionally pinning its identity.
    /// Returns the created node's path, including its sibling index.
    fn create_child(
        &mut self,
        parent: &NodePath,
        name: &str,
        primary_type: &str,
        identity: Option<Uuid>,
    ) -> Result<NodePath, TargetError>;

    fn remove_node(&mut self, path: &NodePath) -> Result<(), TargetError>;

    /// Child segments in document order
    fn children(&self, path: &NodePath) -> Result<Vec<PathSegment>, TargetError>;

    /// Reorder primitive: place `child` immediately before `before`, or
    /// at the end when `before` is `None`
    fn move_before(
        &mut self,
        parent: &NodePath,
        child: &PathSegment,
        before: Option<&PathSegment>,
    ) -> Result<(), TargetError>;

    fn property_names(&self, path: &NodePath) -> Result<Vec<String>, TargetError>;

    fn property(&self, path: &NodePath, name: &str)
        -> Result<Option<PropertyState>, TargetError>;

    fn set_property(
        &mut self,
        path: &NodePath,
        name: &str,
        state: PropertyState,
    ) -> Result<(), TargetError>;

    fn remove_property(&mut self, path: &NodePath, name: &str) -> Result<(), TargetError>;

    fn lock_state(&self, path: &NodePath) -> Result<LockState, TargetError>;

    /// Whether the store itself forbids removing this property
    /// (schema-mandatory or store-internal)
    fn is_protected_property(&self, path: &NodePath, name: &str) -> Result<bool, TargetError>;

    /// Whether the node's type maintains an orderable child list
    fn supports_ordering(&self, path: &NodePath) -> Result<bool, TargetError>;

    /// Persist all staged mutations
    fn commit(&mut self) -> Result<(), TargetError>;

    /// Reload from the durable state, keeping staged mutations only when
    /// `keep_changes` is set
    fn refresh(&mut self, keep_changes: bool) -> Result<(), TargetError>;

    fn has_pending_changes(&self) -> bool;
}
