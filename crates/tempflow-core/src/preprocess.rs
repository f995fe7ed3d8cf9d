//! Dead-weight pruning of a DAG.
//!
//! One pass over the nodes in topological order. For every node except the
//! source, `mintimein` is the earliest first interaction over its live
//! incoming edges; nothing can leave the node at or before that moment, so
//! outgoing interactions with `timestamp <= mintimein` are dropped. A node
//! with no live incoming edge is deleted together with its outgoing edges,
//! and a node whose outgoing edges all die is deleted together with its
//! incoming edges, cascading upward through an explicit worklist.
//!
//! The caller gets an explicit [`PreprocessOutcome`]. Trimmed interactions
//! are written into the input DAG; deleted edges are never patched out of
//! adjacency but produce a fresh [`Dag`] generation instead.

use serde::Serialize;

use crate::dag::Dag;
use crate::error::FlowError;
use crate::id::{EdgeId, NodeId};

/// What preprocessing did to a DAG.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessOutcome {
    /// Nothing was removed.
    Unchanged,
    /// Interactions were trimmed in place; topology is unchanged.
    Pruned,
    /// Edges were deleted; this is the surviving DAG.
    Rebuilt(Dag),
    /// The sink cannot receive anything from the source.
    ZeroFlow,
}

impl PreprocessOutcome {
    pub fn is_zero_flow(&self) -> bool {
        matches!(self, PreprocessOutcome::ZeroFlow)
    }
}

/// Deletion counters of one preprocessing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    pub deleted_interactions: usize,
    pub deleted_edges: usize,
    pub deleted_nodes: usize,
}

/// Result of [`preprocess`].
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub outcome: PreprocessOutcome,
    pub stats: PruneStats,
}

/// Prunes `dag` given a topological `order` of its nodes.
///
/// On [`PreprocessOutcome::ZeroFlow`] the contents of `dag` are partially
/// trimmed and should be discarded.
pub fn preprocess(dag: &mut Dag, order: &[NodeId]) -> Result<Preprocessed, FlowError> {
    if order.len() != dag.node_count() {
        return Err(FlowError::InvalidEdgeSet {
            reason: format!(
                "order covers {} of {} nodes",
                order.len(),
                dag.node_count()
            ),
        });
    }

    let mut pass = Pass::new(dag);
    let zero = pass.run(dag, order);
    let stats = pass.stats;

    let outcome = if zero {
        PreprocessOutcome::ZeroFlow
    } else if stats.deleted_edges > 0 {
        let deleted = pass.edge_deleted;
        PreprocessOutcome::Rebuilt(dag.rebuild(|id, _| !deleted[id.index()])?)
    } else if stats.deleted_interactions > 0 {
        PreprocessOutcome::Pruned
    } else {
        PreprocessOutcome::Unchanged
    };

    tracing::debug!(
        interactions = stats.deleted_interactions,
        edges = stats.deleted_edges,
        nodes = stats.deleted_nodes,
        zero_flow = zero,
        "preprocessed DAG"
    );
    Ok(Preprocessed { outcome, stats })
}

struct Pass {
    edge_deleted: Vec<bool>,
    node_deleted: Vec<bool>,
    deleted_out: Vec<usize>,
    stats: PruneStats,
}

impl Pass {
    fn new(dag: &Dag) -> Self {
        Pass {
            edge_deleted: vec![false; dag.edge_count()],
            node_deleted: vec![false; dag.node_count()],
            deleted_out: vec![0; dag.node_count()],
            stats: PruneStats::default(),
        }
    }

    /// Runs the pass; returns `true` if the DAG carries zero flow.
    fn run(&mut self, dag: &mut Dag, order: &[NodeId]) -> bool {
        let source = dag.source();
        let sink = dag.sink();

        // Edges without interactions carry nothing.
        for i in 0..dag.edge_count() {
            let id = EdgeId(i as u32);
            if dag.edge(id).interactions.is_empty() {
                self.delete_edge(dag, id);
            }
        }
        if self.starved(dag, source) {
            return true;
        }

        for &node in order {
            if node == source || self.node_deleted[node.index()] {
                continue;
            }

            let mintimein = dag
                .incoming(node)
                .iter()
                .filter(|e| !self.edge_deleted[e.index()])
                .filter_map(|&e| dag.edge(e).interactions.first())
                .map(|i| i.timestamp)
                .min_by(f64::total_cmp);

            match mintimein {
                None => {
                    self.delete_node(node);
                    for e in dag.outgoing(node).to_vec() {
                        if !self.edge_deleted[e.index()] {
                            self.delete_edge(dag, e);
                        }
                    }
                    if node == sink {
                        return true;
                    }
                }
                Some(mintimein) => {
                    for e in dag.outgoing(node).to_vec() {
                        if self.edge_deleted[e.index()] {
                            continue;
                        }
                        let stream = dag.interactions_mut(e);
                        let before = stream.len();
                        stream.retain(|i| i.timestamp > mintimein);
                        self.stats.deleted_interactions += before - stream.len();
                        if stream.is_empty() {
                            self.delete_edge(dag, e);
                        }
                    }
                    if self.starved(dag, node) && self.cascade(dag, node) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Whether every outgoing edge of a node with out-degree > 0 is deleted.
    fn starved(&self, dag: &Dag, node: NodeId) -> bool {
        let out = dag.outgoing(node).len();
        out > 0 && self.deleted_out[node.index()] == out
    }

    /// Deletes `start` and every ancestor left without outgoing edges.
    /// Returns `true` if the source would be deleted.
    fn cascade(&mut self, dag: &Dag, start: NodeId) -> bool {
        let source = dag.source();
        let mut worklist = vec![start];

        while let Some(node) = worklist.pop() {
            if self.node_deleted[node.index()] {
                continue;
            }
            self.delete_node(node);

            for &e in dag.incoming(node) {
                if self.edge_deleted[e.index()] {
                    continue;
                }
                let src = dag.edge(e).src;
                self.delete_edge(dag, e);
                if self.starved(dag, src) {
                    if src == source {
                        return true;
                    }
                    worklist.push(src);
                }
            }
        }
        false
    }

    fn delete_node(&mut self, node: NodeId) {
        self.node_deleted[node.index()] = true;
        self.stats.deleted_nodes += 1;
    }

    fn delete_edge(&mut self, dag: &Dag, e: EdgeId) {
        let edge = dag.edge(e);
        self.edge_deleted[e.index()] = true;
        self.deleted_out[edge.src.index()] += 1;
        self.stats.deleted_edges += 1;
        self.stats.deleted_interactions += edge.interactions.len();
    }
}
