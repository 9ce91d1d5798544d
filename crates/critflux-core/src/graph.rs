//! Adjacency graph - the undirected neighbor relation over nodes.
//!
//! Nodes are plain indices `0..N`. Everything past the topology builders
//! sees the graph only through [`AdjacencyGraph`], so the step engine and
//! the diagnostics never branch on topology kind.

use crate::error::{Result, TopologyError};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

/// Read-only view of a symmetric neighbor list.
///
/// Neighbor order is part of the contract: the collapse phase consumes
/// random draws in neighbor-list order, so implementations must return
/// the same order on every call.
pub trait AdjacencyGraph {
    /// Number of nodes.
    fn node_count(&self) -> usize;

    /// Neighbors of node `i`, in construction order.
    fn neighbors(&self, i: usize) -> &[usize];

    /// Number of neighbors of node `i`.
    fn degree(&self, i: usize) -> usize {
        self.neighbors(i).len()
    }

    /// Number of undirected edges.
    fn edge_count(&self) -> usize {
        (0..self.node_count()).map(|i| self.degree(i)).sum::<usize>() / 2
    }

    /// Largest degree in the graph (0 for an empty graph).
    fn max_degree(&self) -> usize {
        (0..self.node_count()).map(|i| self.degree(i)).max().unwrap_or(0)
    }
}

/// An owned neighbor list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency {
    lists: Vec<Vec<usize>>,
}

/// Degree distribution summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DegreeStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl Adjacency {
    /// Wrap neighbor lists without checking them. Call [`Adjacency::validate`]
    /// before handing the graph to a simulation.
    pub fn from_lists(lists: Vec<Vec<usize>>) -> Self {
        Self { lists }
    }

    /// Empty lists for `n` nodes, to be filled with [`Adjacency::link`].
    pub fn with_nodes(n: usize) -> Self {
        Self {
            lists: vec![Vec::new(); n],
        }
    }

    /// Add the undirected edge `a - b`, keeping first-insertion order and
    /// ignoring repeats and self-loops.
    pub fn link(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        push_unique(&mut self.lists[a], b);
        push_unique(&mut self.lists[b], a);
    }

    pub fn lists(&self) -> &[Vec<usize>] {
        &self.lists
    }

    pub fn into_lists(self) -> Vec<Vec<usize>> {
        self.lists
    }

    /// Check range, self-loops, duplicates and symmetry.
    pub fn validate(&self) -> Result<()> {
        validate_lists(&self.lists)
    }

    /// Number of connected components (isolated nodes count as one each).
    pub fn component_count(&self) -> usize {
        component_count(self)
    }

    pub fn is_connected(&self) -> bool {
        self.component_count() <= 1
    }

    pub fn degree_stats(&self) -> DegreeStats {
        degree_stats(self)
    }
}

impl AdjacencyGraph for Adjacency {
    fn node_count(&self) -> usize {
        self.lists.len()
    }

    fn neighbors(&self, i: usize) -> &[usize] {
        &self.lists[i]
    }
}

impl AdjacencyGraph for [Vec<usize>] {
    fn node_count(&self) -> usize {
        self.len()
    }

    fn neighbors(&self, i: usize) -> &[usize] {
        &self[i]
    }
}

impl AdjacencyGraph for Vec<Vec<usize>> {
    fn node_count(&self) -> usize {
        self.len()
    }

    fn neighbors(&self, i: usize) -> &[usize] {
        &self[i]
    }
}

pub(crate) fn push_unique(list: &mut Vec<usize>, value: usize) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Check a raw neighbor list against the graph invariants.
pub fn validate_lists(lists: &[Vec<usize>]) -> Result<()> {
    let count = lists.len();
    for (node, nb) in lists.iter().enumerate() {
        for (k, &neighbor) in nb.iter().enumerate() {
            if neighbor >= count {
                return Err(TopologyError::NeighborOutOfRange {
                    node,
                    neighbor,
                    count,
                }
                .into());
            }
            if neighbor == node {
                return Err(TopologyError::SelfLoop { node }.into());
            }
            if nb[..k].contains(&neighbor) {
                return Err(TopologyError::DuplicateNeighbor { node, neighbor }.into());
            }
            if !lists[neighbor].contains(&node) {
                return Err(TopologyError::Asymmetric {
                    from: node,
                    to: neighbor,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Component representative of every node, from a union-find over every
/// edge. Two nodes share a label exactly when they are connected.
pub fn component_labels<G: AdjacencyGraph + ?Sized>(graph: &G) -> Vec<usize> {
    let n = graph.node_count();
    let mut sets = UnionFind::<usize>::new(n);
    for i in 0..n {
        for &j in graph.neighbors(i) {
            if j > i {
                sets.union(i, j);
            }
        }
    }
    sets.into_labeling()
}

/// Count connected components.
pub fn component_count<G: AdjacencyGraph + ?Sized>(graph: &G) -> usize {
    if graph.node_count() == 0 {
        return 0;
    }
    let mut labels = component_labels(graph);
    labels.sort_unstable();
    labels.dedup();
    labels.len()
}

pub fn degree_stats<G: AdjacencyGraph + ?Sized>(graph: &G) -> DegreeStats {
    let n = graph.node_count();
    if n == 0 {
        return DegreeStats {
            min: 0,
            max: 0,
            mean: 0.0,
        };
    }
    let mut min = usize::MAX;
    let mut max = 0;
    let mut total = 0;
    for i in 0..n {
        let d = graph.degree(i);
        min = min.min(d);
        max = max.max(d);
        total += d;
    }
    DegreeStats {
        min,
        max,
        mean: total as f64 / n as f64,
    }
}
