use super::reference::{self, DeferredReference};
use super::{ordering, record_override, ApplyReport, ConfigurationError, EngineError};
use crate::config::SylvaConfig;
use crate::model::{
    effective_category, is_managed_node, is_managed_property, Category, ModelNode, NodePath,
    PathSegment, TreeModel,
};
use crate::target::{LockState, TargetAdapter};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Subtrees that survive even a force apply
static PROTECTED_SUBTREES: Lazy<Vec<NodePath>> = Lazy::new(|| {
    ["/sys", "/security"]
        .iter()
        .map(|p| p.parse().expect("protected paths are well-formed"))
        .collect()
});

struct ApplyContext<'m> {
    force: bool,
    baseline: &'m TreeModel,
    update: &'m TreeModel,
    deferred: Vec<DeferredReference>,
    report: ApplyReport,
}

/// Forward three-way merge: walks the update tree depth-first, compares
/// each node against its baseline and live counterparts, and stages the
/// delta against the target.
///
/// Nothing is committed here. A target-access failure aborts the pass
/// and leaves staged partial state for the caller to discard; a locked
/// node is a recoverable skip.
pub struct ReconciliationEngine<'a, T: TargetAdapter> {
    target: &'a mut T,
    extra_protected: Vec<NodePath>,
}

impl<'a, T: TargetAdapter> ReconciliationEngine<'a, T> {
    pub fn new(target: &'a mut T) -> Self {
        Self {
            target,
            extra_protected: Vec::new(),
        }
    }

    pub fn with_config(target: &'a mut T, config: &SylvaConfig) -> Self {
        let extra_protected = config
            .protected_paths
            .iter()
            .filter_map(|p| match p.parse::<NodePath>() {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!("ignoring malformed protected path {p}: {err}");
                    None
                }
            })
            .collect();
        Self {
            target,
            extra_protected,
        }
    }

    /// Reconcile the target toward `update`, using `baseline` to tell
    /// drift from desired changes. With `force` set, update always wins
    /// over runtime changes.
    pub fn apply(
        &mut self,
        baseline: &TreeModel,
        update: &TreeModel,
        force: bool,
    ) -> Result<ApplyReport, EngineError> {
        if baseline.root_path() != update.root_path() {
            return Err(ConfigurationError::RootPathMismatch {
                baseline: baseline.root_path().clone(),
                update: update.root_path().clone(),
            }
            .into());
        }
        let root_path = update.root_path().clone();
        let root_node = update
            .node(&root_path)
            .ok_or_else(|| ConfigurationError::IncompleteModel(root_path.clone()))?;
        if root_node.category != Category::Config {
            debug!("fragment root {root_path} is not config-managed; nothing to do");
            return Ok(ApplyReport::default());
        }
        if !self.target.node_exists(&root_path)? {
            return Err(crate::target::TargetError::NodeNotFound(root_path).into());
        }

        let mut ctx = ApplyContext {
            force,
            baseline,
            update,
            deferred: Vec::new(),
            report: ApplyReport::default(),
        };
        self.apply_node(&mut ctx, &root_path, &root_path)?;

        // second pass: the whole tree exists now
        let deferred = std::mem::take(&mut ctx.deferred);
        reference::flush(&mut *self.target, &root_path, deferred, &mut ctx.report)?;
        Ok(ctx.report)
    }

    /// Like [`apply`](Self::apply), but a target-access failure is an
    /// answer, not an error. Staged changes are left for the caller to
    /// discard either way.
    pub fn verify(
        &mut self,
        baseline: &TreeModel,
        update: &TreeModel,
        force: bool,
    ) -> Result<bool, EngineError> {
        match self.apply(baseline, update, force) {
            Ok(_) => Ok(true),
            Err(EngineError::Target(err)) => {
                warn!("verification pass failed against the target: {err}");
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }

    fn apply_node(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        model_path: &NodePath,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        let update_node = ctx
            .update
            .node(model_path)
            .ok_or_else(|| ConfigurationError::IncompleteModel(model_path.clone()))?;
        let baseline_node = ctx.baseline.node(model_path);

        match self.target.lock_state(target_path)? {
            LockState::Deep => {
                warn!("subtree at {target_path} is deep-locked by another session; skipping");
                ctx.report.skipped_locked.push(target_path.clone());
                return Ok(());
            }
            LockState::Shallow => {
                warn!("node {target_path} is locked by another session; continuing");
            }
            LockState::Unlocked => {}
        }

        self.apply_primary_type(ctx, update_node, baseline_node, target_path)?;
        self.apply_mixins(ctx, update_node, baseline_node, target_path)?;
        self.apply_properties(ctx, update_node, baseline_node, target_path)?;
        self.remove_properties(ctx, update_node, baseline_node, model_path, target_path)?;
        self.apply_children(ctx, update_node, model_path, target_path)?;
        Ok(())
    }

    fn apply_primary_type(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        update_node: &ModelNode,
        baseline_node: Option<&ModelNode>,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        let live = self.target.primary_type(target_path)?;
        let desired = update_node.primary_type.as_str();
        if live == desired {
            return Ok(());
        }
        let baseline_type = baseline_node.map(|n| n.primary_type.as_str());
        let drifted = baseline_type != Some(live.as_str());

        if ctx.force || baseline_type != Some(desired) {
            if drifted {
                record_override(
                    &mut ctx.report,
                    target_path,
                    "primaryType",
                    false,
                    format!("runtime type {live} overwritten with {desired}"),
                );
            }
            self.target.set_primary_type(target_path, desired)?;
            ctx.report.type_changes += 1;
        } else {
            record_override(
                &mut ctx.report,
                target_path,
                "primaryType",
                true,
                format!("keeping runtime type {live}; {desired} is unchanged since the last apply"),
            );
        }
        Ok(())
    }

    fn apply_mixins(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        update_node: &ModelNode,
        baseline_node: Option<&ModelNode>,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        let live = self.target.mixins(target_path)?;
        let empty = std::collections::BTreeSet::new();
        let baseline = baseline_node.map(|n| &n.mixins).unwrap_or(&empty);

        for mixin in update_node.mixins.difference(&live) {
            let was_applied = baseline.contains(mixin);
            if was_applied && !ctx.force {
                record_override(
                    &mut ctx.report,
                    target_path,
                    "mixin",
                    true,
                    format!("mixin {mixin} was removed at runtime; not re-adding"),
                );
                continue;
            }
            if was_applied {
                record_override(
                    &mut ctx.report,
                    target_path,
                    "mixin",
                    false,
                    format!("re-adding mixin {mixin} removed at runtime"),
                );
            }
            self.target.add_mixin(target_path, mixin)?;
            ctx.report.mixin_changes += 1;
        }

        for mixin in live.difference(&update_node.mixins) {
            let runtime_added = !baseline.contains(mixin);
            if runtime_added && !ctx.force {
                record_override(
                    &mut ctx.report,
                    target_path,
                    "mixin",
                    true,
                    format!("keeping mixin {mixin} added at runtime"),
                );
                continue;
            }
            if runtime_added {
                record_override(
                    &mut ctx.report,
                    target_path,
                    "mixin",
                    false,
                    format!("removing mixin {mixin} added at runtime"),
                );
            }
            self.target.remove_mixin(target_path, mixin)?;
            ctx.report.mixin_changes += 1;
        }
        Ok(())
    }

    fn apply_properties(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        update_node: &ModelNode,
        baseline_node: Option<&ModelNode>,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        let root_path = ctx.update.root_path();

        for property in &update_node.properties {
            if property.category != Category::Config {
                continue;
            }
            if !property.is_consistent() {
                return Err(ConfigurationError::UnsupportedValueKind {
                    path: target_path.clone(),
                    property: property.name.clone(),
                }
                .into());
            }

            let desired = property.to_state();
            let live = self.target.property(target_path, &property.name)?;
            let baseline_state = baseline_node
                .and_then(|n| n.property(&property.name))
                .map(|p| p.to_state());

            let needs_write = ctx.force
                || match &baseline_state {
                    None => true,
                    Some(b) => *b != desired,
                };

            if !needs_write {
                // update equals baseline; whatever the live value is, it stays
                let as_desired = match &live {
                    Some(state) => {
                        reference::states_equivalent(&*self.target, &desired, state, root_path)?
                    }
                    None => false,
                };
                if !as_desired {
                    record_override(
                        &mut ctx.report,
                        target_path,
                        "property",
                        true,
                        format!(
                            "keeping runtime value of {}; desired value unchanged since the last apply",
                            property.name
                        ),
                    );
                }
                continue;
            }

            if let Some(state) = &live {
                if reference::states_equivalent(&*self.target, &desired, state, root_path)? {
                    continue;
                }
                let matches_baseline = match &baseline_state {
                    Some(b) => b == state,
                    None => false,
                };
                if !matches_baseline {
                    record_override(
                        &mut ctx.report,
                        target_path,
                        "property",
                        false,
                        format!("overwriting runtime value of {}", property.name),
                    );
                }
            } else if baseline_state.is_some() {
                record_override(
                    &mut ctx.report,
                    target_path,
                    "property",
                    false,
                    format!("re-creating property {} removed at runtime", property.name),
                );
            }

            if property.is_reference() {
                ctx.deferred.push(DeferredReference {
                    target_path: target_path.clone(),
                    property: property.clone(),
                });
            } else {
                self.target
                    .set_property(target_path, &property.name, desired)?;
                ctx.report.properties_written += 1;
            }
        }
        Ok(())
    }

    fn remove_properties(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        update_node: &ModelNode,
        baseline_node: Option<&ModelNode>,
        model_path: &NodePath,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        for name in self.target.property_names(target_path)? {
            if update_node.property(&name).is_some() {
                continue;
            }
            if self.target.is_protected_property(target_path, &name)? {
                continue;
            }
            if !is_managed_property(ctx.update, model_path, &name) {
                continue;
            }
            let in_baseline = baseline_node.and_then(|n| n.property(&name)).is_some();
            if ctx.force || in_baseline {
                self.target.remove_property(target_path, &name)?;
                ctx.report.properties_removed += 1;
            } else {
                debug!("leaving runtime property {name} on {target_path}");
            }
        }
        Ok(())
    }

    fn apply_children(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        update_node: &ModelNode,
        model_path: &NodePath,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        // add or recurse, in update order
        for segment in &update_node.children {
            let child_model_path = model_path.join(segment);
            let child_update = ctx
                .update
                .node(&child_model_path)
                .ok_or_else(|| ConfigurationError::IncompleteModel(child_model_path.clone()))?;
            if child_update.category != Category::Config {
                continue;
            }
            if let Some(anchor) = &child_update.order_before {
                if !update_node.children.contains(anchor) {
                    return Err(ConfigurationError::UnknownOrderBeforeAnchor {
                        parent: model_path.clone(),
                        anchor: anchor.clone(),
                    }
                    .into());
                }
            }

            let child_baseline = ctx.baseline.node(&child_model_path);
            let child_target_path = target_path.join(segment);
            let actual_path = if self.target.node_exists(&child_target_path)? {
                child_target_path
            } else if !ctx.force && child_baseline.is_some() {
                // manual deletion wins
                record_override(
                    &mut ctx.report,
                    &child_target_path,
                    "node",
                    true,
                    "node was removed at runtime; not re-creating".to_string(),
                );
                continue;
            } else {
                let created = self.target.create_child(
                    target_path,
                    segment.name(),
                    &child_update.primary_type,
                    child_update.identity,
                )?;
                ctx.report.nodes_created.push(created.clone());
                created
            };
            self.apply_node(ctx, &child_model_path, &actual_path)?;
        }

        self.remove_children(ctx, update_node, model_path, target_path)?;

        // order last, once the child set is final
        if self.target.supports_ordering(target_path)? && !update_node.ignore_ordering {
            let live_now: HashSet<PathSegment> =
                self.target.children(target_path)?.into_iter().collect();
            let desired: Vec<PathSegment> = update_node
                .children
                .iter()
                .filter(|s| {
                    live_now.contains(*s)
                        && effective_category(ctx.update, &model_path.join(s), None)
                            == Category::Config
                })
                .cloned()
                .collect();
            ctx.report.moves += ordering::reorder(&mut *self.target, target_path, &desired)?;
        }
        Ok(())
    }

    fn remove_children(
        &mut self,
        ctx: &mut ApplyContext<'_>,
        update_node: &ModelNode,
        model_path: &NodePath,
        target_path: &NodePath,
    ) -> Result<(), EngineError> {
        let live = self.target.children(target_path)?;
        // reverse document order keeps the indices of same-name siblings
        // still pending removal valid
        for segment in live.iter().rev() {
            if update_node.children.contains(segment) {
                continue;
            }
            let child_model_path = model_path.join(segment);
            let child_target_path = target_path.join(segment);
            if !is_managed_node(ctx.update, &child_model_path) {
                continue;
            }
            if self.is_protected_subtree(&child_target_path) {
                if ctx.force {
                    debug!("protected subtree {child_target_path} is never removed");
                }
                continue;
            }
            let in_baseline = ctx.baseline.node(&child_model_path).is_some();
            if ctx.force || in_baseline {
                self.target.remove_node(&child_target_path)?;
                ctx.report.nodes_removed.push(child_target_path);
            } else {
                debug!("leaving runtime child {child_target_path}");
            }
        }
        Ok(())
    }

    fn is_protected_subtree(&self, path: &NodePath) -> bool {
        PROTECTED_SUBTREES
            .iter()
            .chain(self.extra_protected.iter())
            .any(|p| p.starts_with(path) || path.starts_with(p))
    }
}
