//! Bounded enumeration of source-to-sink paths in the transaction graph.
//!
//! A depth-first walk from the source extends a path one edge at a time, up
//! to `max_path_len` accounts. A path ending at the sink contributes its
//! edges to the result set; a path returning to the source is a loop and is
//! dropped. Before a longer path is extended, its newest edge is checked
//! against the edges collected so far: if the edge's source is reachable
//! from its destination, accepting it would close a cycle and the branch is
//! pruned. Self-loops are never expanded.
//!
//! The walk recurses at most `max_path_len` deep. The reachability check
//! uses an explicit stack and a visited set.

use std::collections::{HashMap, HashSet};

use petgraph::graph::EdgeIndex;

use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::graph::TransactionGraph;
use crate::id::AccountId;

/// The deduplicated edges of every accepted path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathSet {
    edges: Vec<EdgeIndex<u32>>,
    total_interactions: usize,
    truncated: bool,
    limit: usize,
}

impl PathSet {
    /// Collected edges in discovery order. The first edge leaves the source.
    pub fn edges(&self) -> &[EdgeIndex<u32>] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Sum of interaction counts over the collected edges.
    pub fn total_interactions(&self) -> usize {
        self.total_interactions
    }

    /// Whether some accepted path was dropped because of the edge capacity.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Returns [`FlowError::CapacityExceeded`] if paths were dropped.
    pub fn capacity_warning(&self) -> Option<FlowError> {
        self.truncated
            .then_some(FlowError::CapacityExceeded { limit: self.limit })
    }
}

/// Enumerates paths from `source` to `sink` and collects their edges.
///
/// `source == sink` asks for loops back to the origin. Fails with
/// [`FlowError::NoPath`] if nothing was collected.
pub fn find_paths(
    graph: &TransactionGraph,
    source: AccountId,
    sink: AccountId,
    config: &FlowConfig,
) -> Result<PathSet, FlowError> {
    config.validate()?;
    for id in [source, sink] {
        if !graph.contains(id) {
            return Err(FlowError::UnknownAccount { id });
        }
    }

    let mut walk = Walk {
        graph,
        source,
        sink,
        max_len: config.max_path_len,
        max_edges: config.max_edges,
        labels: vec![source],
        path: Vec::with_capacity(config.max_path_len),
        collected: HashSet::new(),
        successors: HashMap::new(),
        result: PathSet {
            limit: config.max_edges,
            ..PathSet::default()
        },
    };
    walk.expand(source);
    let result = walk.result;

    if let Some(warning) = result.capacity_warning() {
        tracing::warn!(%source, %sink, "{}", warning);
    }
    if result.is_empty() {
        return Err(FlowError::NoPath {
            from: source,
            to: sink,
        });
    }
    tracing::debug!(
        %source,
        %sink,
        edges = result.len(),
        interactions = result.total_interactions,
        "collected path edges"
    );
    Ok(result)
}

/// State of one enumeration.
struct Walk<'g> {
    graph: &'g TransactionGraph,
    source: AccountId,
    sink: AccountId,
    max_len: usize,
    max_edges: usize,
    /// Accounts on the current path, source first.
    labels: Vec<AccountId>,
    /// Edges of the current path as `(edge, src, dest)`.
    path: Vec<(EdgeIndex<u32>, AccountId, AccountId)>,
    collected: HashSet<EdgeIndex<u32>>,
    /// Adjacency of the collected edges, for the reachability check.
    successors: HashMap<AccountId, Vec<AccountId>>,
    result: PathSet,
}

impl Walk<'_> {
    /// Examines the current path, which ends at `at`, and extends it if
    /// it is still open.
    fn expand(&mut self, at: AccountId) {
        let len = self.labels.len();
        let mut closed = false;

        if len > 1 {
            if at == self.sink {
                if self.collected.len() + self.path.len() > self.max_edges {
                    self.result.truncated = true;
                    return;
                }
                self.accept_path();
                closed = true;
            } else if at == self.source {
                closed = true;
            } else if len > 2 {
                let (_, src, dest) = self.path[len - 2];
                closed = self.closes_cycle(src, dest);
            }
        }

        if len == 1 || (len < self.max_len && !closed) {
            for (edge, dest) in self.graph.outgoing(at) {
                if dest == at {
                    continue;
                }
                self.labels.push(dest);
                self.path.push((edge, at, dest));
                self.expand(dest);
                self.path.pop();
                self.labels.pop();
            }
        }
    }

    fn accept_path(&mut self) {
        for &(edge, src, dest) in &self.path {
            if self.collected.insert(edge) {
                self.result.edges.push(edge);
                self.result.total_interactions +=
                    self.graph.interactions(edge).map_or(0, <[_]>::len);
                self.successors.entry(src).or_default().push(dest);
            }
        }
    }

    /// Returns `true` if `target` can be reached from `start` over the
    /// collected edges and the current path minus its newest edge, never
    /// walking through the sink.
    fn closes_cycle(&self, target: AccountId, start: AccountId) -> bool {
        let partial = &self.path[..self.path.len() - 1];
        let mut visited: HashSet<AccountId> = HashSet::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            let from_collected = self
                .successors
                .get(&node)
                .into_iter()
                .flatten()
                .copied();
            let from_path = partial
                .iter()
                .filter(|(_, src, _)| *src == node)
                .map(|(_, _, dest)| *dest);

            for next in from_collected.chain(from_path) {
                if next == target {
                    return true;
                }
                if next != self.sink && visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Interaction;

    fn graph(accounts: u32, edges: &[(u32, u32)]) -> TransactionGraph {
        let mut g = TransactionGraph::with_accounts(accounts);
        for (i, &(src, dest)) in edges.iter().enumerate() {
            g.add_edge(
                AccountId(src),
                AccountId(dest),
                vec![Interaction::new(i as f64, 1.0), Interaction::new(i as f64 + 0.5, 1.0)],
            )
            .unwrap();
        }
        g
    }

    fn endpoints(g: &TransactionGraph, set: &PathSet) -> Vec<(u32, u32)> {
        set.edges()
            .iter()
            .map(|&e| {
                let (s, d) = g.endpoints(e).unwrap();
                (s.0, d.0)
            })
            .collect()
    }

    #[test]
    fn single_edge_path() {
        let g = graph(2, &[(0, 1)]);
        let set = find_paths(&g, AccountId(0), AccountId(1), &FlowConfig::default()).unwrap();
        assert_eq!(endpoints(&g, &set), vec![(0, 1)]);
        assert_eq!(set.total_interactions(), 2);
        assert!(set.capacity_warning().is_none());
    }

    #[test]
    fn shared_edges_are_collected_once() {
        // 0 -> 1 -> 3 and 0 -> 1 -> 2 -> 3 share 0 -> 1.
        let g = graph(4, &[(0, 1), (1, 3), (1, 2), (2, 3)]);
        let set = find_paths(&g, AccountId(0), AccountId(3), &FlowConfig::default()).unwrap();
        assert_eq!(endpoints(&g, &set), vec![(0, 1), (1, 3), (1, 2), (2, 3)]);
        assert_eq!(set.total_interactions(), 8);
    }

    #[test]
    fn paths_are_bounded_by_length() {
        // 0 -> 1 -> 2 -> 3 -> 4 has five accounts.
        let g = graph(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let err = find_paths(&g, AccountId(0), AccountId(4), &FlowConfig::default()).unwrap_err();
        assert!(matches!(err, FlowError::NoPath { .. }));

        let config = FlowConfig {
            max_path_len: 5,
            ..FlowConfig::default()
        };
        let set = find_paths(&g, AccountId(0), AccountId(4), &config).unwrap();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn loop_query_collects_cycle_through_origin() {
        let g = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        let set = find_paths(&g, AccountId(0), AccountId(0), &FlowConfig::default()).unwrap();
        assert_eq!(endpoints(&g, &set), vec![(0, 1), (1, 2), (2, 0)]);
    }

    #[test]
    fn return_to_source_is_not_a_path() {
        // 0 -> 1 -> 0 -> ... must not be followed back out of the source.
        let g = graph(3, &[(0, 1), (1, 0), (1, 2)]);
        let set = find_paths(&g, AccountId(0), AccountId(2), &FlowConfig::default()).unwrap();
        assert_eq!(endpoints(&g, &set), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn self_loops_are_skipped() {
        let g = graph(2, &[(0, 0), (0, 1), (1, 1)]);
        let set = find_paths(&g, AccountId(0), AccountId(1), &FlowConfig::default()).unwrap();
        assert_eq!(endpoints(&g, &set), vec![(0, 1)]);
    }

    #[test]
    fn edge_closing_a_cycle_is_pruned() {
        // 0 -> 1 -> 3 and 0 -> 2 -> 3 are collected first; 1 -> 2 and
        // 2 -> 1 would then form a cycle with each other, so only the
        // first one discovered survives.
        let g = graph(4, &[(0, 1), (1, 2), (1, 3), (0, 2), (2, 1), (2, 3)]);
        let set = find_paths(&g, AccountId(0), AccountId(3), &FlowConfig::default()).unwrap();
        let found = endpoints(&g, &set);
        assert!(found.contains(&(1, 2)));
        assert!(!found.contains(&(2, 1)));
    }

    #[test]
    fn capacity_truncation_is_reported() {
        let g = graph(4, &[(0, 1), (1, 3), (0, 2), (2, 3)]);
        let config = FlowConfig {
            max_edges: 2,
            ..FlowConfig::default()
        };
        let set = find_paths(&g, AccountId(0), AccountId(3), &config).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.truncated());
        assert!(matches!(
            set.capacity_warning(),
            Some(FlowError::CapacityExceeded { limit: 2 })
        ));
    }

    #[test]
    fn unknown_accounts_are_rejected() {
        let g = graph(2, &[(0, 1)]);
        let err = find_paths(&g, AccountId(0), AccountId(9), &FlowConfig::default()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownAccount { id } if id == AccountId(9)));
    }

    #[test]
    fn unreachable_sink_is_no_path() {
        let g = graph(3, &[(0, 1)]);
        let err = find_paths(&g, AccountId(0), AccountId(2), &FlowConfig::default()).unwrap_err();
        assert!(matches!(err, FlowError::NoPath { .. }));
    }
}
