//! Inverse diff: derive a new desired-state fragment from observed
//! drift in the live tree.
//!
//! The output is the complete new desired state for the subtree, not a
//! bare patch: unchanged content is carried over from the baseline
//! (preserving its origin and category metadata), drift is merged in.
//! Applying the result on top of the same baseline reproduces the live
//! tree, which is what makes export the engine's inverse.

use crate::config::SylvaConfig;
use crate::engine::{reference, ConfigurationError, EngineError};
use crate::model::{
    effective_category, is_managed_property, Category, ModelError, ModelNode, ModelProperty,
    NodePath, PathSegment, ReferenceValue, TreeModel, TreeModelBuilder, Value,
};
use crate::target::{TargetAdapter, TargetError};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Engine-derived properties that never belong in a desired-state model
static SUPPRESSED_PROPERTIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "sys:id",
        "sys:created",
        "sys:createdBy",
        "sys:lastModified",
        "sys:lastModifiedBy",
        "sys:baseline",
    ]
    .into_iter()
    .collect()
});

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Target access failed: {0}")]
    Target(#[from] TargetError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Inconsistent model: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl From<EngineError> for ExportError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Target(e) => ExportError::Target(e),
            EngineError::Configuration(e) => ExportError::Configuration(e),
            EngineError::Lock(e) => {
                ExportError::Target(TargetError::AccessFailed(e.to_string()))
            }
        }
    }
}

/// Computes desired-state fragments from the live tree, mirroring the
/// forward engine's category filtering so the two directions cannot
/// drift apart.
pub struct ExportDeltaComputer<'a, T: TargetAdapter> {
    target: &'a T,
    extra_suppressed: HashSet<String>,
}

impl<'a, T: TargetAdapter> ExportDeltaComputer<'a, T> {
    pub fn new(target: &'a T) -> Self {
        Self {
            target,
            extra_suppressed: HashSet::new(),
        }
    }

    pub fn with_config(target: &'a T, config: &SylvaConfig) -> Self {
        Self {
            target,
            extra_suppressed: config.suppressed_properties.iter().cloned().collect(),
        }
    }

    /// Export the live subtree at `subtree` as a new desired-state
    /// fragment, using `baseline` to carry over unchanged content.
    pub fn export(
        &self,
        subtree: &NodePath,
        baseline: &TreeModel,
    ) -> Result<TreeModel, ExportError> {
        let live_type = self.target.primary_type(subtree)?;
        let mut builder = TreeModelBuilder::new(subtree.clone(), &live_type);
        if effective_category(baseline, subtree, None) == Category::Config {
            self.fill_node(&mut builder, baseline, subtree, &subtree.clone())?;
        } else {
            debug!("subtree {subtree} is not config-managed; exporting an empty fragment");
        }
        Ok(builder.build())
    }

    fn fill_node(
        &self,
        builder: &mut TreeModelBuilder,
        baseline: &TreeModel,
        live_path: &NodePath,
        model_path: &NodePath,
    ) -> Result<(), ExportError> {
        let counterpart = baseline.node(live_path);

        for mixin in self.target.mixins(live_path)? {
            builder.add_mixin(model_path, &mixin)?;
        }

        if let Some(node) = counterpart {
            if node.category != Category::default() {
                builder.set_category(model_path, node.category)?;
            }
            if let Some(origin) = &node.origin {
                builder.set_origin(model_path, origin)?;
            }
            if node.ignore_ordering {
                builder.set_ignore_ordering(model_path, true)?;
            }
            // a pinned identity stays pinned; nodes with no counterpart
            // never gain one, since pins are authored metadata and live
            // ids are generated
            if node.identity.is_some() {
                if let Some(id) = self.target.node_id(live_path)? {
                    builder.set_identity(model_path, id)?;
                }
            }
        }

        self.fill_properties(builder, baseline, live_path, model_path, counterpart)?;
        self.fill_children(builder, baseline, live_path, model_path, counterpart)?;
        Ok(())
    }

    fn fill_properties(
        &self,
        builder: &mut TreeModelBuilder,
        baseline: &TreeModel,
        live_path: &NodePath,
        model_path: &NodePath,
        counterpart: Option<&ModelNode>,
    ) -> Result<(), ExportError> {
        let root_path = baseline.root_path();

        // baseline properties first, keeping their order stable
        if let Some(node) = counterpart {
            for property in &node.properties {
                if self.is_suppressed(&property.name) {
                    continue;
                }
                let live = match self.target.property(live_path, &property.name)? {
                    Some(state) => state,
                    None => {
                        debug!(
                            "property {} on {live_path} was removed; dropping from fragment",
                            property.name
                        );
                        continue;
                    }
                };
                if property.category != Category::Config {
                    // runtime-owned: the model keeps its declaration as-is
                    builder.add_property(model_path, property.clone())?;
                    continue;
                }
                let unchanged = if property.value_type.is_reference() {
                    reference::states_equivalent(
                        self.target,
                        &property.to_state(),
                        &live,
                        root_path,
                    )?
                } else {
                    property.to_state() == live
                };
                if unchanged {
                    builder.add_property(model_path, property.clone())?;
                } else if property.kind != live.kind || property.value_type != live.value_type {
                    // kind or value-type change: full replace
                    builder.add_property(
                        model_path,
                        ModelProperty {
                            name: property.name.clone(),
                            kind: live.kind,
                            value_type: live.value_type,
                            values: self.export_values(&live.values)?,
                            category: property.category,
                        },
                    )?;
                } else {
                    // same shape: patch the values into the baseline entry
                    let mut patched = property.clone();
                    patched.values = self.export_values(&live.values)?;
                    builder.add_property(model_path, patched)?;
                }
            }
        }

        // then properties added in the live tree
        for name in self.target.property_names(live_path)? {
            if counterpart.and_then(|n| n.property(&name)).is_some() {
                continue;
            }
            if self.is_suppressed(&name) {
                continue;
            }
            if !is_managed_property(baseline, live_path, &name) {
                continue;
            }
            if let Some(state) = self.target.property(live_path, &name)? {
                builder.add_property(
                    model_path,
                    ModelProperty {
                        name,
                        kind: state.kind,
                        value_type: state.value_type,
                        values: self.export_values(&state.values)?,
                        category: Category::Config,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn fill_children(
        &self,
        builder: &mut TreeModelBuilder,
        baseline: &TreeModel,
        live_path: &NodePath,
        model_path: &NodePath,
        counterpart: Option<&ModelNode>,
    ) -> Result<(), ExportError> {
        // fragment sibling indices are assigned over managed children
        // only; same-name siblings split across categories would make
        // them diverge from live indices
        let managed: Vec<PathSegment> = self
            .target
            .children(live_path)?
            .into_iter()
            .filter(|s| {
                effective_category(baseline, &live_path.join(s), None) == Category::Config
            })
            .collect();

        let track_order = !counterpart.map_or(false, |n| n.ignore_ordering);
        let baseline_children: Vec<PathSegment> = counterpart
            .map(|n| n.children.clone())
            .unwrap_or_default();
        // baseline-implied order, restricted to children still alive
        let mut expected: Vec<PathSegment> = baseline_children
            .iter()
            .filter(|s| managed.contains(s))
            .cloned()
            .collect();
        let mut pointer = 0;

        for (i, segment) in managed.iter().enumerate() {
            let child_live_path = live_path.join(segment);
            let child_type = self.target.primary_type(&child_live_path)?;
            let child_model_path = builder.add_node(model_path, segment.name(), &child_type)?;

            let is_new = !baseline_children.contains(segment);
            if track_order {
                if is_new {
                    // a new child deviates only when it was slotted in
                    // front of something pre-existing
                    let has_preexisting_successor = managed[i + 1..]
                        .iter()
                        .any(|s| baseline_children.contains(s));
                    if has_preexisting_successor {
                        builder
                            .set_order_before(&child_model_path, managed.get(i + 1).cloned())?;
                    }
                } else if pointer < expected.len() && expected[pointer] == *segment {
                    pointer += 1;
                } else {
                    // moved: anchor to the immediate live successor
                    builder.set_order_before(&child_model_path, managed.get(i + 1).cloned())?;
                    expected.retain(|s| s != segment);
                }
            }

            self.fill_node(builder, baseline, &child_live_path, &child_model_path)?;
        }
        Ok(())
    }

    fn export_values(&self, values: &[Value]) -> Result<Vec<Value>, ExportError> {
        values.iter().map(|v| self.export_value(v)).collect()
    }

    /// References are exported in path form when the destination is
    /// still reachable; otherwise the identity is kept verbatim
    fn export_value(&self, value: &Value) -> Result<Value, ExportError> {
        match value {
            Value::Reference(ReferenceValue::Identity(id)) => {
                Ok(match self.target.path_by_id(id)? {
                    Some(path) => Value::Reference(ReferenceValue::Path(path.to_string())),
                    None => value.clone(),
                })
            }
            Value::WeakReference(ReferenceValue::Identity(id)) => {
                Ok(match self.target.path_by_id(id)? {
                    Some(path) => Value::WeakReference(ReferenceValue::Path(path.to_string())),
                    None => value.clone(),
                })
            }
            other => Ok(other.clone()),
        }
    }

    fn is_suppressed(&self, name: &str) -> bool {
        SUPPRESSED_PROPERTIES.contains(name) || self.extra_suppressed.contains(name)
    }
}
