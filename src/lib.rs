pub mod config;
pub mod engine;
pub mod export;
pub mod lock;
pub mod model;
pub mod store;
pub mod target;
pub mod utils;

// Re-export commonly used types
pub use config::{read_config, write_config, ConfigError, SylvaConfig};
pub use engine::{
    apply_locked, ApplyReport, ConfigurationError, EngineError, OverrideRecord,
    ReconciliationEngine,
};
pub use export::{ExportDeltaComputer, ExportError};
pub use lock::{
    DistributedLock, LockError, LockGuard, NoopDistributedLock, ReconciliationLock,
};
pub use model::{
    effective_category, is_managed_node, is_managed_property, Category, ModelError, ModelNode,
    ModelProperty, NodePath, PathSegment, PropertyKind, PropertyState, ReferenceValue, Resource,
    TreeModel, TreeModelBuilder, Value, ValueType,
};
pub use store::{
    JsonSnapshotStore, ModelSource, SnapshotSelector, SnapshotStore, StoreError,
};
pub use target::{LockState, MemoryTarget, TargetAdapter, TargetError};
pub use utils::compute_digest;
