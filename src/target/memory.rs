use super::adapter::{LockState, TargetAdapter, TargetError};
use crate::model::{is_valid_name, NodePath, PathSegment, PropertyState};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct LiveNode {
    id: Uuid,
    primary_type: String,
    mixins: BTreeSet<String>,
    properties: Vec<(String, PropertyState)>,
    children: Vec<(String, LiveNode)>,
    orderable: bool,
}

impl LiveNode {
    fn new(primary_type: &str, identity: Option<Uuid>) -> Self {
        Self {
            id: identity.unwrap_or_else(Uuid::new_v4),
            primary_type: primary_type.to_string(),
            mixins: BTreeSet::new(),
            properties: Vec::new(),
            children: Vec::new(),
            orderable: true,
        }
    }

    fn child(&self, segment: &PathSegment) -> Option<&LiveNode> {
        let mut nth = 0;
        self.children.iter().find_map(|(name, node)| {
            if name == segment.name() {
                nth += 1;
                (nth == segment.index()).then_some(node)
            } else {
                None
            }
        })
    }

    fn child_mut(&mut self, segment: &PathSegment) -> Option<&mut LiveNode> {
        let mut nth = 0;
        self.children.iter_mut().find_map(|(name, node)| {
            if name == segment.name() {
                nth += 1;
                (nth == segment.index()).then_some(node)
            } else {
                None
            }
        })
    }

    /// Position of `segment` in the child list
    fn child_position(&self, segment: &PathSegment) -> Option<usize> {
        let mut nth = 0;
        self.children.iter().position(|(name, _)| {
            if name == segment.name() {
                nth += 1;
                nth == segment.index()
            } else {
                false
            }
        })
    }

    fn segments(&self) -> Vec<PathSegment> {
        let mut counts: HashMap<&str, u32> = HashMap::new();
        self.children
            .iter()
            .map(|(name, _)| {
                let n = counts.entry(name.as_str()).or_insert(0);
                *n += 1;
                PathSegment::unchecked(name, *n)
            })
            .collect()
    }

    fn find_by_id(&self, id: &Uuid, at: &NodePath) -> Option<NodePath> {
        if self.id == *id {
            return Some(at.clone());
        }
        for segment in self.segments() {
            let child = self.child(&segment)?;
            if let Some(found) = child.find_by_id(id, &at.join(&segment)) {
                return Some(found);
            }
        }
        None
    }
}

/// In-memory [`TargetAdapter`] with committed/working state, suitable for
/// tests and embedders that keep the live tree in process.
///
/// Locks are session-external facts, so they survive commit and refresh;
/// `lock_node` and `set_failing` exist for exercising the engine's
/// recovery paths.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    working: LiveNode,
    committed: LiveNode,
    locks: HashMap<NodePath, LockState>,
    failing: bool,
}

impl MemoryTarget {
    pub fn new(root_type: &str) -> Self {
        let root = LiveNode::new(root_type, None);
        Self {
            committed: root.clone(),
            working: root,
            locks: HashMap::new(),
            failing: false,
        }
    }

    /// Mark a node as locked by another session
    pub fn lock_node(&mut self, path: &NodePath, state: LockState) {
        self.locks.insert(path.clone(), state);
    }

    pub fn unlock_node(&mut self, path: &NodePath) {
        self.locks.remove(path);
    }

    /// Make every subsequent access fail, emulating a lost backend
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Mark the node's type as not maintaining child order
    pub fn set_orderable(&mut self, path: &NodePath, orderable: bool) -> Result<(), TargetError> {
        self.node_mut(path)?.orderable = orderable;
        Ok(())
    }

    fn check_access(&self) -> Result<(), TargetError> {
        if self.failing {
            Err(TargetError::AccessFailed("backend unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn node(&self, path: &NodePath) -> Result<&LiveNode, TargetError> {
        let mut current = &self.working;
        for segment in path.segments() {
            current = current
                .child(segment)
                .ok_or_else(|| TargetError::NodeNotFound(path.clone()))?;
        }
        Ok(current)
    }

    fn node_mut(&mut self, path: &NodePath) -> Result<&mut LiveNode, TargetError> {
        let mut current = &mut self.working;
        for segment in path.segments() {
            current = current
                .child_mut(segment)
                .ok_or_else(|| TargetError::NodeNotFound(path.clone()))?;
        }
        Ok(current)
    }
}

impl TargetAdapter for MemoryTarget {
    fn node_exists(&self, path: &NodePath) -> Result<bool, TargetError> {
        self.check_access()?;
        Ok(self.node(path).is_ok())
    }

    fn node_id(&self, path: &NodePath) -> Result<Option<Uuid>, TargetError> {
        self.check_access()?;
        Ok(self.node(path).ok().map(|n| n.id))
    }

    fn path_by_id(&self, id: &Uuid) -> Result<Option<NodePath>, TargetError> {
        self.check_access()?;
        Ok(self.working.find_by_id(id, &NodePath::root()))
    }

    fn primary_type(&self, path: &NodePath) -> Result<String, TargetError> {
        self.check_access()?;
        Ok(self.node(path)?.primary_type.clone())
    }

    fn set_primary_type(
        &mut self,
        path: &NodePath,
        primary_type: &str,
    ) -> Result<(), TargetError> {
        self.check_access()?;
        self.node_mut(path)?.primary_type = primary_type.to_string();
        Ok(())
    }

    fn mixins(&self, path: &NodePath) -> Result<BTreeSet<String>, TargetError> {
        self.check_access()?;
        Ok(self.node(path)?.mixins.clone())
    }

    fn add_mixin(&mut self, path: &NodePath, mixin: &str) -> Result<(), TargetError> {
        self.check_access()?;
        self.node_mut(path)?.mixins.insert(mixin.to_string());
        Ok(())
    }

    fn remove_mixin(&mut self, path: &NodePath, mixin: &str) -> Result<(), TargetError> {
        self.check_access()?;
        self.node_mut(path)?.mixins.remove(mixin);
        Ok(())
    }

    fn create_child(
        &mut self,
        parent: &NodePath,
        name: &str,
        primary_type: &str,
        identity: Option<Uuid>,
    ) -> Result<NodePath, TargetError> {
        self.check_access()?;
        if !is_valid_name(name) {
            return Err(TargetError::AccessFailed(format!("invalid name: {name}")));
        }
        let parent_node = self.node_mut(parent)?;
        parent_node
            .children
            .push((name.to_string(), LiveNode::new(primary_type, identity)));
        let index = parent_node
            .children
            .iter()
            .filter(|(n, _)| n == name)
            .count() as u32;
        Ok(parent.join(&PathSegment::unchecked(name, index)))
    }

    fn remove_node(&mut self, path: &NodePath) -> Result<(), TargetError> {
        self.check_access()?;
        let segment = path
            .last()
            .ok_or_else(|| TargetError::AccessFailed("cannot remove the root".to_string()))?
            .clone();
        let parent = path.parent().unwrap_or_default();
        let parent_node = self.node_mut(&parent)?;
        let position = parent_node
            .child_position(&segment)
            .ok_or_else(|| TargetError::NodeNotFound(path.clone()))?;
        parent_node.children.remove(position);
        Ok(())
    }

    fn children(&self, path: &NodePath) -> Result<Vec<PathSegment>, TargetError> {
        self.check_access()?;
        Ok(self.node(path)?.segments())
    }

    fn move_before(
        &mut self,
        parent: &NodePath,
        child: &PathSegment,
        before: Option<&PathSegment>,
    ) -> Result<(), TargetError> {
        self.check_access()?;
        let parent_node = self.node_mut(parent)?;
        let from = parent_node
            .child_position(child)
            .ok_or_else(|| TargetError::ChildNotFound {
                parent: parent.clone(),
                segment: child.clone(),
            })?;
        let mut to = match before {
            Some(anchor) => {
                parent_node
                    .child_position(anchor)
                    .ok_or_else(|| TargetError::ChildNotFound {
                        parent: parent.clone(),
                        segment: anchor.clone(),
                    })?
            }
            None => parent_node.children.len(),
        };
        let entry = parent_node.children.remove(from);
        if from < to {
            to -= 1;
        }
        parent_node.children.insert(to, entry);
        Ok(())
    }

    fn property_names(&self, path: &NodePath) -> Result<Vec<String>, TargetError> {
        self.check_access()?;
        Ok(self
            .node(path)?
            .properties
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn property(
        &self,
        path: &NodePath,
        name: &str,
    ) -> Result<Option<PropertyState>, TargetError> {
        self.check_access()?;
        Ok(self
            .node(path)?
            .properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, state)| state.clone()))
    }

    fn set_property(
        &mut self,
        path: &NodePath,
        name: &str,
        state: PropertyState,
    ) -> Result<(), TargetError> {
        self.check_access()?;
        let node = self.node_mut(path)?;
        if let Some(entry) = node.properties.iter_mut().find(|(n, _)| n == name) {
            entry.1 = state;
        } else {
            node.properties.push((name.to_string(), state));
        }
        Ok(())
    }

    fn remove_property(&mut self, path: &NodePath, name: &str) -> Result<(), TargetError> {
        self.check_access()?;
        self.node_mut(path)?.properties.retain(|(n, _)| n != name);
        Ok(())
    }

    fn lock_state(&self, path: &NodePath) -> Result<LockState, TargetError> {
        self.check_access()?;
        if let Some(state) = self.locks.get(path) {
            return Ok(*state);
        }
        // a deep lock on an ancestor covers this node
        let mut current = path.parent();
        while let Some(p) = current {
            if self.locks.get(&p) == Some(&LockState::Deep) {
                return Ok(LockState::Deep);
            }
            current = p.parent();
        }
        Ok(LockState::Unlocked)
    }

    fn is_protected_property(&self, path: &NodePath, name: &str) -> Result<bool, TargetError> {
        self.check_access()?;
        let _ = path;
        Ok(name.starts_with("sys:"))
    }

    fn supports_ordering(&self, path: &NodePath) -> Result<bool, TargetError> {
        self.check_access()?;
        Ok(self.node(path)?.orderable)
    }

    fn commit(&mut self) -> Result<(), TargetError> {
        self.check_access()?;
        self.committed = self.working.clone();
        Ok(())
    }

    fn refresh(&mut self, keep_changes: bool) -> Result<(), TargetError> {
        self.check_access()?;
        if !keep_changes {
            self.working = self.committed.clone();
        }
        Ok(())
    }

    fn has_pending_changes(&self) -> bool {
        self.working != self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn path(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    fn seg(s: &str) -> PathSegment {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_and_resolve_sns() {
        let mut target = MemoryTarget::new("app:root");
        let a1 = target
            .create_child(&NodePath::root(), "item", "app:item", None)
            .unwrap();
        let a2 = target
            .create_child(&NodePath::root(), "item", "app:item", None)
            .unwrap();
        assert_eq!(a1.to_string(), "/item");
        assert_eq!(a2.to_string(), "/item[2]");
        assert!(target.node_exists(&a2).unwrap());
        assert_eq!(
            target.children(&NodePath::root()).unwrap(),
            vec![seg("item"), seg("item[2]")]
        );
    }

    #[test]
    fn test_removal_renumbers_siblings() {
        let mut target = MemoryTarget::new("app:root");
        for _ in 0..3 {
            target
                .create_child(&NodePath::root(), "item", "app:item", None)
                .unwrap();
        }
        target
            .set_property(
                &path("/item[2]"),
                "marker",
                PropertyState::single(Value::Boolean(true)),
            )
            .unwrap();
        target.remove_node(&path("/item")).unwrap();

        // former item[2] is now item[1]
        assert_eq!(
            target.children(&NodePath::root()).unwrap(),
            vec![seg("item"), seg("item[2]")]
        );
        assert!(target.property(&path("/item"), "marker").unwrap().is_some());
    }

    #[test]
    fn test_move_before() {
        let mut target = MemoryTarget::new("app:root");
        for name in ["a", "b", "c"] {
            target
                .create_child(&NodePath::root(), name, "app:item", None)
                .unwrap();
        }
        target
            .move_before(&NodePath::root(), &seg("c"), Some(&seg("a")))
            .unwrap();
        assert_eq!(
            target.children(&NodePath::root()).unwrap(),
            vec![seg("c"), seg("a"), seg("b")]
        );
        target.move_before(&NodePath::root(), &seg("c"), None).unwrap();
        assert_eq!(
            target.children(&NodePath::root()).unwrap(),
            vec![seg("a"), seg("b"), seg("c")]
        );
    }

    #[test]
    fn test_commit_and_refresh() {
        let mut target = MemoryTarget::new("app:root");
        target
            .create_child(&NodePath::root(), "a", "app:item", None)
            .unwrap();
        assert!(target.has_pending_changes());
        target.commit().unwrap();
        assert!(!target.has_pending_changes());

        target
            .create_child(&NodePath::root(), "b", "app:item", None)
            .unwrap();
        target.refresh(false).unwrap();
        assert!(!target.node_exists(&path("/b")).unwrap());
        assert!(target.node_exists(&path("/a")).unwrap());
    }

    #[test]
    fn test_deep_lock_covers_subtree() {
        let mut target = MemoryTarget::new("app:root");
        let a = target
            .create_child(&NodePath::root(), "a", "app:item", None)
            .unwrap();
        let b = target.create_child(&a, "b", "app:item", None).unwrap();
        target.lock_node(&a, LockState::Deep);
        assert_eq!(target.lock_state(&b).unwrap(), LockState::Deep);
        assert_eq!(target.lock_state(&NodePath::root()).unwrap(), LockState::Unlocked);
    }

    #[test]
    fn test_identity_lookup() {
        let mut target = MemoryTarget::new("app:root");
        let id = Uuid::new_v4();
        let a = target
            .create_child(&NodePath::root(), "a", "app:item", Some(id))
            .unwrap();
        assert_eq!(target.node_id(&a).unwrap(), Some(id));
        assert_eq!(target.path_by_id(&id).unwrap(), Some(a));
        assert_eq!(target.path_by_id(&Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn test_failing_switch() {
        let mut target = MemoryTarget::new("app:root");
        target.set_failing(true);
        assert!(matches!(
            target.node_exists(&NodePath::root()),
            Err(TargetError::AccessFailed(_))
        ));
    }
}
