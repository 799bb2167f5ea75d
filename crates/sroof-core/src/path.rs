//! Shortest-path computation over a topology snapshot.
//!
//! The network model carries no link cost, so shortest means fewest
//! hops and a breadth-first search is sufficient. When several
//! shortest paths exist the search always picks the same one for a
//! given graph: neighbors are expanded in lexicographic order, so the
//! tie-break prefers the smallest identifier at every level.
//! Nondeterministic tie-breaking would make reconciliation flap
//! between equally short paths even on an unchanged graph.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{SrError, SrResult};
use crate::topology::{SwitchId, TopologyGraph};

/// Computes the shortest path from `src` to `dst` as an ordered
/// switch sequence, endpoints included.
///
/// Returns [`SrError::NoPathFound`] if either endpoint is not in the
/// graph or the pair is disconnected. That is an expected outcome,
/// not a defect; callers branch on it.
pub fn shortest_path(
    graph: &TopologyGraph,
    src: &SwitchId,
    dst: &SwitchId,
) -> SrResult<Vec<SwitchId>> {
    let no_path = || SrError::NoPathFound {
        src: src.clone(),
        dst: dst.clone(),
    };

    if !graph.contains(src) || !graph.contains(dst) {
        return Err(no_path());
    }
    if src == dst {
        return Ok(vec![src.clone()]);
    }

    let mut parent: BTreeMap<SwitchId, SwitchId> = BTreeMap::new();
    let mut visited: BTreeSet<SwitchId> = BTreeSet::new();
    let mut queue: VecDeque<SwitchId> = VecDeque::new();
    visited.insert(src.clone());
    queue.push_back(src.clone());

    'search: while let Some(current) = queue.pop_front() {
        for (next, _port) in graph.neighbors(&current) {
            if !visited.insert(next.clone()) {
                continue;
            }
            parent.insert(next.clone(), current.clone());
            if next == dst {
                break 'search;
            }
            queue.push_back(next.clone());
        }
    }

    if !parent.contains_key(dst) {
        return Err(no_path());
    }

    let mut path = vec![dst.clone()];
    while let Some(prev) = parent.get(path.last().expect("path is never empty")) {
        path.push(prev.clone());
    }
    path.reverse();
    Ok(path)
}

/// Next hop on the shortest path from `src` to `dst`, or `None` when
/// the pair is disconnected (or identical).
pub fn next_hop(graph: &TopologyGraph, src: &SwitchId, dst: &SwitchId) -> Option<SwitchId> {
    shortest_path(graph, src, dst)
        .ok()
        .and_then(|p| p.get(1).cloned())
}
