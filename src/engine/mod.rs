mod apply;
pub mod ordering;
pub mod reference;

pub use apply::ReconciliationEngine;

use crate::lock::{DistributedLock, LockError, ReconciliationLock};
use crate::model::{NodePath, PathSegment, TreeModel, ValueType};
use crate::target::{TargetAdapter, TargetError};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Target access failed: {0}")]
    Target(#[from] TargetError),

    #[error("Inconsistent model: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

/// A logically inconsistent model. Always terminal: there is no point
/// retrying until the model itself is fixed.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Baseline is rooted at {baseline} but update at {update}")]
    RootPathMismatch {
        baseline: NodePath,
        update: NodePath,
    },

    #[error("Model names child {0} but carries no node for it")]
    IncompleteModel(NodePath),

    #[error("Order-before anchor {anchor} is not a sibling under {parent}")]
    UnknownOrderBeforeAnchor {
        parent: NodePath,
        anchor: PathSegment,
    },

    #[error("Cannot order {segment} under {parent}: not present")]
    OrderTargetMissing {
        parent: NodePath,
        segment: PathSegment,
    },

    #[error("Property {property} on {path} does not match its declared kind")]
    UnsupportedValueKind { path: NodePath, property: String },

    #[error("Value of type {0:?} cannot be resolved as a reference")]
    NotAReference(ValueType),
}

/// One audited decision about manually changed live state
#[derive(Debug, Clone)]
pub struct OverrideRecord {
    pub path: NodePath,
    pub subject: String,
    /// Whether the runtime change survived the pass
    pub preserved: bool,
    pub detail: String,
}

/// Outcome of one apply pass. The caller decides whether to commit the
/// staged mutations or discard them.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub nodes_created: Vec<NodePath>,
    pub nodes_removed: Vec<NodePath>,
    pub properties_written: u32,
    pub properties_removed: u32,
    pub type_changes: u32,
    pub mixin_changes: u32,
    pub moves: u32,
    pub skipped_locked: Vec<NodePath>,
    /// (node path, property name) pairs whose reference values dangled
    pub unresolved_references: Vec<(NodePath, String)>,
    pub overrides: Vec<OverrideRecord>,
}

impl ApplyReport {
    /// Total number of staged mutations
    pub fn mutation_count(&self) -> usize {
        self.nodes_created.len()
            + self.nodes_removed.len()
            + self.properties_written as usize
            + self.properties_removed as usize
            + self.type_changes as usize
            + self.mixin_changes as usize
            + self.moves as usize
    }

    pub fn is_noop(&self) -> bool {
        self.mutation_count() == 0
    }
}

pub(crate) fn record_override(
    report: &mut ApplyReport,
    path: &NodePath,
    subject: &str,
    preserved: bool,
    detail: String,
) {
    info!("[OVERRIDE] {path} ({subject}): {detail}");
    report.overrides.push(OverrideRecord {
        path: path.clone(),
        subject: subject.to_string(),
        preserved,
        detail,
    });
}

/// Run one apply pass under the reconciliation lock.
///
/// The target view is refreshed right after the lock is acquired, so a
/// baseline written by another process is observed before merging.
pub fn apply_locked<T, D>(
    lock: &ReconciliationLock<D>,
    target: &mut T,
    baseline: &TreeModel,
    update: &TreeModel,
    force: bool,
) -> Result<ApplyReport, EngineError>
where
    T: TargetAdapter,
    D: DistributedLock,
{
    let _guard = lock.lock()?;
    target.refresh(false)?;
    ReconciliationEngine::new(target).apply(baseline, update, force)
}
