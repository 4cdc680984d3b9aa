//! Dependency ordering
//!
//! Kahn's algorithm over the resolved edges. Among resources that are ready
//! at the same time the earliest-declared one goes first, so the order is
//! stable for a given topology.

use crate::error::{PlanError, Result};
use crate::resolver::Edge;
use stackflow_core::{Resource, ResourceId};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use tracing::{debug, instrument, warn};

/// Creation order for `nodes`, dependencies first
#[instrument(skip_all, fields(nodes = nodes.len(), edges = edges.len()))]
pub fn order(edges: &[Edge], nodes: &[Resource]) -> Result<Vec<ResourceId>> {
    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for edge in edges {
        let (from, to) = (edge.from_id.index(), edge.to_id.index());
        if from >= n || to >= n {
            return Err(PlanError::InvalidEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }
        in_degree[from] += 1;
        dependents[to].push(from);
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut sequence = Vec::with_capacity(n);

    while let Some(Reverse(next)) = ready.pop() {
        sequence.push(ResourceId(next));
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if sequence.len() < n {
        let cycle = find_cycle(edges, &in_degree)
            .into_iter()
            .map(|i| nodes[i].name.clone())
            .collect::<Vec<_>>();
        warn!(cycle = ?cycle, "Cyclic dependency detected");
        return Err(PlanError::CyclicDependency { cycle });
    }

    debug!(
        order = ?sequence.iter().map(|id| nodes[id.index()].name.as_str()).collect::<Vec<_>>(),
        "Ordering complete"
    );
    Ok(sequence)
}

/// Walk leftover nodes until one repeats
///
/// Every node Kahn could not emit still has an unemitted dependency, so the
/// walk from the earliest leftover always closes a loop.
fn find_cycle(edges: &[Edge], in_degree: &[usize]) -> Vec<usize> {
    let leftover = |i: usize| in_degree[i] > 0;
    let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); in_degree.len()];
    for edge in edges {
        let (from, to) = (edge.from_id.index(), edge.to_id.index());
        if leftover(from) && leftover(to) {
            dependencies[from].insert(to);
        }
    }

    let Some(start) = (0..in_degree.len()).find(|&i| leftover(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    while let Some(&next) = dependencies[current].iter().next() {
        if let Some(pos) = path.iter().position(|&p| p == next) {
            return path.split_off(pos);
        }
        path.push(next);
        current = next;
    }

    path
}
