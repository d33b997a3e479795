//! Minimal-move reconciliation of child order.
//!
//! The live child list may contain foreign entries the desired order
//! knows nothing about (runtime content, skipped siblings). Those are
//! never moved: the walk compares desired entries against the live
//! sequence with foreign entries masked out, and issues one move per
//! out-of-place entry, anchored before whatever currently occupies its
//! slot. Cost is proportional to actual misordering, not tree size.

use super::{ConfigurationError, EngineError};
use crate::model::{NodePath, PathSegment};
use crate::target::TargetAdapter;
use std::collections::HashSet;

/// Bring the managed children of `parent` into `desired` order.
///
/// Every entry of `desired` must currently exist under `parent`.
/// Returns the number of moves issued.
pub fn reorder<T: TargetAdapter + ?Sized>(
    target: &mut T,
    parent: &NodePath,
    desired: &[PathSegment],
) -> Result<u32, EngineError> {
    let desired_set: HashSet<PathSegment> = desired.iter().cloned().collect();
    let mut moves = 0;

    for (slot, want) in desired.iter().enumerate() {
        // re-read each round: a move among same-name siblings renumbers them
        let current = target.children(parent)?;
        let managed: Vec<PathSegment> = current
            .into_iter()
            .filter(|s| desired_set.contains(s))
            .collect();
        match managed.get(slot) {
            Some(occupant) if occupant == want => {}
            Some(occupant) => {
                target.move_before(parent, want, Some(occupant))?;
                moves += 1;
            }
            None => {
                return Err(ConfigurationError::OrderTargetMissing {
                    parent: parent.clone(),
                    segment: want.clone(),
                }
                .into())
            }
        }
    }

    Ok(moves)
}
