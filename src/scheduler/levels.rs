//! Phase 1 of the DAG Scheduler: partition a [`Dag`] into levels via repeated
//! Kahn peeling, so Phase 2 can dispatch each level's tools concurrently
//! once every earlier level has finished (`spec.md` §4.4, `P2`).
use std::collections::{HashMap, HashSet};

use crate::error::InternalError;
use crate::registry::{Dag, ToolName};

/// Compute levels `L0..Ln` such that every dependency of a tool in `Li`
/// appears in some `Lj` with `j < i`.
///
/// # Errors
///
/// Returns [`InternalError::InvariantViolation`] if `dag` contains a cycle —
/// this should never happen for a subgraph of an already-validated
/// [`crate::registry::Registry`], so surfacing it here indicates a bug.
pub fn compute_levels(dag: &Dag) -> Result<Vec<Vec<ToolName>>, InternalError> {
    let mut remaining: HashSet<ToolName> = dag.nodes.iter().cloned().collect();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let mut level: Vec<ToolName> = remaining
            .iter()
            .filter(|name| {
                dag.edges
                    .get(*name)
                    .is_none_or(|deps| deps.iter().all(|d| !remaining.contains(d)))
            })
            .cloned()
            .collect();

        if level.is_empty() {
            return Err(InternalError::InvariantViolation(
                "dependency subgraph contains a cycle during level computation".to_string(),
            ));
        }

        level.sort();
        for name in &level {
            remaining.remove(name);
        }
        levels.push(level);
    }

    Ok(levels)
}

/// Map each tool to the index of the level it was placed in, for quick
/// dependency-level lookups during dispatch.
#[must_use]
pub fn level_index(levels: &[Vec<ToolName>]) -> HashMap<ToolName, usize> {
    levels
        .iter()
        .enumerate()
        .flat_map(|(i, level)| level.iter().map(move |name| (name.clone(), i)))
        .collect()
}
