use super::path::NodePath;
use super::tree::TreeModel;
use serde::{Deserialize, Serialize};

/// Governs whether a subtree or property is managed by the engine.
///
/// `Config` content is owned by the desired-state model. `Content` is
/// runtime data the engine must leave alone. `System` is store-internal
/// state that is neither written nor exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    #[default]
    Config,
    Content,
    System,
}

/// Effective category of a node or property at `path` in `model`.
///
/// A property falls back to its node's category when it is not declared.
/// A path absent from the model inherits from its nearest declared
/// ancestor; with no declared ancestor it defaults to `Config`, so
/// unknown live content under a managed subtree is treated as managed.
///
/// This is the single category decision point for both the forward merge
/// and the export computer.
pub fn effective_category(model: &TreeModel, path: &NodePath, property: Option<&str>) -> Category {
    if let Some(node) = model.node(path) {
        if let Some(name) = property {
            if let Some(prop) = node.property(name) {
                return prop.category;
            }
        }
        return node.category;
    }
    let mut current = path.parent();
    while let Some(p) = current {
        if let Some(node) = model.node(&p) {
            return node.category;
        }
        current = p.parent();
    }
    Category::default()
}

/// True when the node at `path` is managed by the engine
pub fn is_managed_node(model: &TreeModel, path: &NodePath) -> bool {
    effective_category(model, path, None) == Category::Config
}

/// True when the property `name` at `path` is managed by the engine
pub fn is_managed_property(model: &TreeModel, path: &NodePath, name: &str) -> bool {
    effective_category(model, path, Some(name)) == Category::Config
}
