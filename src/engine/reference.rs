//! Deferred resolution of reference-typed values.
//!
//! A reference may point into a sibling subtree the traversal has not
//! created yet, so reference properties are queued during the walk and
//! flushed once the full target tree exists. A reference that still does
//! not resolve at flush time is a local problem: the value is dropped
//! with a warning and everything else proceeds.

use super::{ApplyReport, ConfigurationError, EngineError};
use crate::model::{ModelProperty, NodePath, PropertyState, ReferenceValue, Value, ValueType};
use crate::target::TargetAdapter;
use tracing::warn;
use uuid::Uuid;

/// A reference property waiting for the post-walk flush
#[derive(Debug)]
pub(crate) struct DeferredReference {
    pub target_path: NodePath,
    pub property: ModelProperty,
}

/// Resolve one reference-typed value to a live node identity.
///
/// Relative paths resolve against `root_path`, the root of the owning
/// fragment. A dangling or unparseable reference yields `None` with a
/// warning; passing a non-reference value is a model inconsistency.
pub fn resolve<T: TargetAdapter + ?Sized>(
    target: &T,
    value: &Value,
    root_path: &NodePath,
) -> Result<Option<Uuid>, EngineError> {
    let reference = value
        .as_reference()
        .ok_or_else(|| ConfigurationError::NotAReference(value.value_type()))?;

    match reference {
        ReferenceValue::Identity(id) => Ok(target.path_by_id(id)?.map(|_| *id)),
        ReferenceValue::Path(p) => {
            let absolute = if p.starts_with('/') {
                match p.parse::<NodePath>() {
                    Ok(path) => path,
                    Err(err) => {
                        warn!("unresolvable reference path {p}: {err}");
                        return Ok(None);
                    }
                }
            } else {
                match root_path.resolve(p) {
                    Ok(path) => path,
                    Err(err) => {
                        warn!("unresolvable reference path {p} against {root_path}: {err}");
                        return Ok(None);
                    }
                }
            };
            Ok(target.node_id(&absolute)?)
        }
    }
}

/// Compare a model property state with a live one, resolving reference
/// values on both sides so a path reference and the identity it was
/// written as compare equal.
pub(crate) fn states_equivalent<T: TargetAdapter + ?Sized>(
    target: &T,
    model_state: &PropertyState,
    live_state: &PropertyState,
    root_path: &NodePath,
) -> Result<bool, EngineError> {
    if !model_state.value_type.is_reference() {
        return Ok(model_state == live_state);
    }
    if model_state.kind != live_state.kind
        || model_state.value_type != live_state.value_type
        || model_state.values.len() != live_state.values.len()
    {
        return Ok(false);
    }
    for (model_value, live_value) in model_state.values.iter().zip(&live_state.values) {
        let wanted = resolve(target, model_value, root_path)?;
        let actual = resolve(target, live_value, root_path)?;
        if wanted.is_none() || wanted != actual {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Write out all queued reference properties against the now-complete
/// target tree.
pub(crate) fn flush<T: TargetAdapter + ?Sized>(
    target: &mut T,
    root_path: &NodePath,
    deferred: Vec<DeferredReference>,
    report: &mut ApplyReport,
) -> Result<(), EngineError> {
    for item in deferred {
        let property = &item.property;
        let mut resolved = Vec::new();
        for value in &property.values {
            match resolve(target, value, root_path)? {
                Some(id) => resolved.push(identity_value(property.value_type, id)),
                None => {
                    warn!(
                        "dangling reference in {} on {}; value skipped",
                        property.name, item.target_path
                    );
                    report
                        .unresolved_references
                        .push((item.target_path.clone(), property.name.clone()));
                }
            }
        }
        if resolved.is_empty() {
            warn!(
                "reference property {} on {} has no resolvable values; not written",
                property.name, item.target_path
            );
            continue;
        }
        let state = PropertyState {
            kind: property.kind,
            value_type: property.value_type,
            values: resolved,
        };
        if target.property(&item.target_path, &property.name)?.as_ref() == Some(&state) {
            continue;
        }
        target.set_property(&item.target_path, &property.name, state)?;
        report.properties_written += 1;
    }
    Ok(())
}

fn identity_value(value_type: ValueType, id: Uuid) -> Value {
    match value_type {
        ValueType::WeakReference => Value::WeakReference(ReferenceValue::Identity(id)),
        _ => Value::Reference(ReferenceValue::Identity(id)),
    }
}
