//! The simulator's adjacency-list view of the swarm and hop routing.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;

use crate::protocol::AgentId;

/// Float coordinates as broadcast by the drones
pub type Position = [f64; 2];

fn distance(a: &Position, b: &Position) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Symmetric adjacency lists. Only nodes with at least one neighbour appear,
/// and equality ignores neighbour order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityGraph {
    adjacency: BTreeMap<AgentId, BTreeSet<AgentId>>,
}

impl ConnectivityGraph {
    /// Link every pair of distinct nodes within `radius` of each other
    pub fn build(positions: &BTreeMap<AgentId, Position>, radius: f64) -> Self {
        let mut graph = Self::default();
        for (&a, pa) in positions {
            for (&b, pb) in positions.range((Bound::Excluded(a), Bound::Unbounded)) {
                if distance(pa, pb) <= radius {
                    graph.link(a, b);
                }
            }
        }
        graph
    }

    pub fn link(&mut self, a: AgentId, b: AgentId) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn neighbours(&self, node: AgentId) -> impl Iterator<Item = AgentId> + '_ {
        self.adjacency.get(&node).into_iter().flatten().copied()
    }

    pub fn is_linked(&self, a: AgentId, b: AgentId) -> bool {
        self.adjacency.get(&a).is_some_and(|set| set.contains(&b))
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// Breadth-first hop sequences from `source`.
    ///
    /// Each reachable node maps to the nodes traversed from `source` up to,
    /// but not including, that node. `source` itself maps to an empty route.
    pub fn shortest_paths(&self, source: AgentId) -> BTreeMap<AgentId, Vec<AgentId>> {
        let mut paths = BTreeMap::new();
        let mut queue = VecDeque::new();

        paths.insert(source, Vec::new());
        queue.push_back(source);

        while let Some(current) = queue.pop_front() {
            for neighbour in self.neighbours(current) {
                if paths.contains_key(&neighbour) {
                    continue;
                }
                let mut route = paths[&current].clone();
                route.push(current);
                paths.insert(neighbour, route);
                queue.push_back(neighbour);
            }
        }

        paths
    }
}
