mod category;
mod node;
mod path;
mod property;
mod tree;
mod value;

pub use category::{effective_category, is_managed_node, is_managed_property, Category};
pub use node::ModelNode;
pub use path::{is_valid_name, NodePath, PathSegment};
pub use property::{ModelProperty, PropertyKind, PropertyState};
pub use tree::{TreeModel, TreeModelBuilder};
pub use value::{ReferenceValue, Resource, Value, ValueType};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid node name: {0}")]
    InvalidName(String),

    #[error("Node not found in model: {0}")]
    NodeNotFound(NodePath),
}
