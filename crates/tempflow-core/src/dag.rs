//! Dag: the acyclic source/sink subgraph every flow engine operates on.
//!
//! A [`Dag`] is an arena: `edges` owns every edge and its interaction
//! stream, and each [`DagNode`] refers to its incoming and outgoing edges by
//! dense [`EdgeId`]. Node ids are contiguous, with `NodeId(0)` the source and
//! `NodeId(node_count - 1)` the sink.
//!
//! A DAG is only ever derived from an edge set through the builder in this
//! module, which relabels endpoints, deep-copies and time-sorts every
//! interaction stream, and fills the adjacency lists. Structural changes
//! (preprocessing, chain decomposition) never patch adjacency in place: they
//! build a fresh generation with [`Dag::rebuild`] or [`Dag::from_dag_edges`].
//!
//! Acyclicity is not assumed here; it is established by
//! [`topological_order`](crate::topo::topological_order).

use std::hash::Hash;

use indexmap::map::Entry;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::error::FlowError;
use crate::graph::EdgeSpec;
use crate::id::{AccountId, EdgeId, NodeId};
use crate::interaction::{sort_by_time, Interaction};

/// Adjacency list of a node; most nodes in transaction DAGs have few edges.
pub type EdgeList = SmallVec<[EdgeId; 4]>;

/// An edge of a DAG.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub src: NodeId,
    pub dest: NodeId,
    /// Ascending by timestamp.
    pub interactions: Vec<Interaction>,
}

/// A node of a DAG with its incident edge ids.
#[derive(Debug, Clone, PartialEq)]
pub struct DagNode {
    pub label: NodeId,
    pub incoming: EdgeList,
    pub outgoing: EdgeList,
}

/// One DAG generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Dag {
    nodes: Vec<DagNode>,
    edges: Vec<Edge>,
    /// Original account of every node; the sink keeps the queried sink label.
    labels: Vec<AccountId>,
}

impl Dag {
    /// Builds a DAG from raw-graph edges.
    ///
    /// The source is the `src` of the first edge and becomes `NodeId(0)`;
    /// every other account gets the next free id in scan order, and the last
    /// id is reserved for `sink`. When `sink` equals the source (a loop back
    /// to the origin), edges leaving the account map to the source and edges
    /// entering it map to the sink, so the query still has two endpoints.
    pub fn from_edge_specs(specs: Vec<EdgeSpec>, sink: AccountId) -> Result<Dag, FlowError> {
        let edges = specs
            .into_iter()
            .map(|s| (s.src, s.dest, s.interactions))
            .collect();
        let (nodes, edges, labels) = assemble(edges, sink)?;
        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "built DAG from transaction edges"
        );
        Ok(Dag {
            nodes,
            edges,
            labels,
        })
    }

    /// Builds a fresh DAG generation from edges expressed in `parent`'s ids.
    ///
    /// The first edge leaving `NodeId(0)` is moved to the front so the source
    /// keeps id 0; the other edges keep their relative order. `parent.sink()`
    /// stays the sink. Labels are composed through the
    /// parent so they keep pointing at the original accounts.
    pub fn from_dag_edges(parent: &Dag, mut edges: Vec<Edge>) -> Result<Dag, FlowError> {
        let source = parent.source();
        let first_from_source = edges
            .iter()
            .position(|e| e.src == source)
            .ok_or_else(|| FlowError::InvalidEdgeSet {
                reason: "no remaining edge leaves the source".into(),
            })?;
        edges[..=first_from_source].rotate_right(1);

        let edges = edges
            .into_iter()
            .map(|e| (e.src, e.dest, e.interactions))
            .collect();
        let (nodes, edges, local) = assemble(edges, parent.sink())?;
        let labels = local.iter().map(|n| parent.label(*n)).collect();
        Ok(Dag {
            nodes,
            edges,
            labels,
        })
    }

    /// Builds a fresh DAG from the edges for which `keep` returns `true`.
    pub fn rebuild<F>(&self, mut keep: F) -> Result<Dag, FlowError>
    where
        F: FnMut(EdgeId, &Edge) -> bool,
    {
        let kept = self
            .edges
            .iter()
            .enumerate()
            .filter(|(i, e)| keep(EdgeId(*i as u32), e))
            .map(|(_, e)| e.clone())
            .collect();
        Dag::from_dag_edges(self, kept)
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Total number of interactions over all edges.
    pub fn interaction_count(&self) -> usize {
        self.edges.iter().map(|e| e.interactions.len()).sum()
    }

    pub fn source(&self) -> NodeId {
        NodeId(0)
    }

    pub fn sink(&self) -> NodeId {
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn nodes(&self) -> &[DagNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn incoming(&self, id: NodeId) -> &[EdgeId] {
        &self.nodes[id.index()].incoming
    }

    pub fn outgoing(&self, id: NodeId) -> &[EdgeId] {
        &self.nodes[id.index()].outgoing
    }

    /// Original account label of a node.
    pub fn label(&self, id: NodeId) -> AccountId {
        self.labels[id.index()]
    }

    pub fn labels(&self) -> &[AccountId] {
        &self.labels
    }

    /// Mutable access to an edge's interaction stream, for in-place pruning.
    pub(crate) fn interactions_mut(&mut self, id: EdgeId) -> &mut Vec<Interaction> {
        &mut self.edges[id.index()].interactions
    }

    /// Verifies that the adjacency lists list every edge exactly once, at
    /// its own endpoints, and nowhere else.
    pub fn check_adjacency(&self) -> Result<(), FlowError> {
        let mut seen_out = vec![0u32; self.edges.len()];
        let mut seen_in = vec![0u32; self.edges.len()];

        for node in &self.nodes {
            for &e in &node.outgoing {
                if self.edges[e.index()].src != node.label {
                    return Err(inconsistent(format!(
                        "edge {} listed as outgoing of node {}",
                        e, node.label
                    )));
                }
                seen_out[e.index()] += 1;
            }
            for &e in &node.incoming {
                if self.edges[e.index()].dest != node.label {
                    return Err(inconsistent(format!(
                        "edge {} listed as incoming of node {}",
                        e, node.label
                    )));
                }
                seen_in[e.index()] += 1;
            }
        }

        if let Some(i) = (0..self.edges.len()).find(|&i| seen_out[i] != 1 || seen_in[i] != 1) {
            return Err(inconsistent(format!("edge {} is not listed exactly once", i)));
        }
        Ok(())
    }
}

fn inconsistent(reason: String) -> FlowError {
    FlowError::InvalidEdgeSet { reason }
}

type Assembled<K> = (Vec<DagNode>, Vec<Edge>, Vec<K>);

/// Relabels an edge set into a contiguous id space and fills adjacency.
///
/// `K` is the label space of the input: accounts for a first build, the
/// parent's node ids for a rebuild.
fn assemble<K>(input: Vec<(K, K, Vec<Interaction>)>, sink: K) -> Result<Assembled<K>, FlowError>
where
    K: Copy + Eq + Hash + std::fmt::Debug,
{
    let source = match input.first() {
        Some((src, _, _)) => *src,
        None => {
            return Err(FlowError::InvalidEdgeSet {
                reason: "empty edge set".into(),
            })
        }
    };
    if source != sink {
        if let Some((src, dest, _)) = input.iter().find(|(src, _, _)| *src == sink) {
            return Err(FlowError::InvalidEdgeSet {
                reason: format!("edge {:?}->{:?} leaves the sink", src, dest),
            });
        }
    }

    // Pass 0: assign ids in scan order, sink last.
    let mut ids: IndexMap<K, u32> = IndexMap::new();
    ids.insert(source, 0);
    for (src, dest, _) in &input {
        let next = ids.len() as u32;
        if let Entry::Vacant(slot) = ids.entry(*src) {
            slot.insert(next);
        }
        let next = ids.len() as u32;
        if *dest != sink {
            if let Entry::Vacant(slot) = ids.entry(*dest) {
                slot.insert(next);
            }
        }
    }
    let sink_id = ids.len() as u32;
    let node_count = ids.len() + 1;

    let mut labels: Vec<K> = ids.keys().copied().collect();
    labels.push(sink);

    let edges: Vec<Edge> = input
        .into_iter()
        .map(|(src, dest, mut interactions)| {
            sort_by_time(&mut interactions);
            let dest_id = if dest == sink { sink_id } else { ids[&dest] };
            Edge {
                src: NodeId(ids[&src]),
                dest: NodeId(dest_id),
                interactions,
            }
        })
        .collect();

    // Pass 1: count degrees. Pass 2: fill adjacency.
    let mut out_degree = vec![0usize; node_count];
    let mut in_degree = vec![0usize; node_count];
    for e in &edges {
        out_degree[e.src.index()] += 1;
        in_degree[e.dest.index()] += 1;
    }

    let mut nodes: Vec<DagNode> = (0..node_count)
        .map(|i| DagNode {
            label: NodeId(i as u32),
            incoming: EdgeList::with_capacity(in_degree[i]),
            outgoing: EdgeList::with_capacity(out_degree[i]),
        })
        .collect();
    for (i, e) in edges.iter().enumerate() {
        nodes[e.src.index()].outgoing.push(EdgeId(i as u32));
        nodes[e.dest.index()].incoming.push(EdgeId(i as u32));
    }

    Ok((nodes, edges, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(src: u32, dest: u32, inters: &[(f64, f64)]) -> EdgeSpec {
        EdgeSpec {
            src: AccountId(src),
            dest: AccountId(dest),
            interactions: inters
                .iter()
                .map(|&(t, q)| Interaction::new(t, q))
                .collect(),
        }
    }

    #[test]
    fn source_first_sink_last() {
        let dag = Dag::from_edge_specs(
            vec![
                spec(10, 20, &[(0.0, 1.0)]),
                spec(20, 30, &[(1.0, 1.0)]),
                spec(10, 40, &[(0.0, 1.0)]),
                spec(40, 30, &[(2.0, 1.0)]),
            ],
            AccountId(30),
        )
        .unwrap();

        assert_eq!(dag.node_count(), 4);
        assert_eq!(dag.edge_count(), 4);
        assert_eq!(
            dag.labels(),
            &[AccountId(10), AccountId(20), AccountId(40), AccountId(30)]
        );
        assert!(dag.incoming(dag.source()).is_empty());
        assert!(dag.outgoing(dag.sink()).is_empty());
        assert_eq!(dag.incoming(dag.sink()).len(), 2);
        dag.check_adjacency().unwrap();
    }

    #[test]
    fn loop_query_splits_origin_into_source_and_sink() {
        // 5 -> 6 -> 5: source and sink are the same account.
        let dag = Dag::from_edge_specs(
            vec![spec(5, 6, &[(0.0, 3.0)]), spec(6, 5, &[(1.0, 2.0)])],
            AccountId(5),
        )
        .unwrap();

        assert_eq!(dag.node_count(), 3);
        assert_eq!(dag.edge(EdgeId(0)).src, NodeId(0));
        assert_eq!(dag.edge(EdgeId(1)).dest, NodeId(2));
        assert_eq!(dag.label(dag.source()), AccountId(5));
        assert_eq!(dag.label(dag.sink()), AccountId(5));
        dag.check_adjacency().unwrap();
    }

    #[test]
    fn interactions_are_deep_copied_and_sorted() {
        let specs = vec![spec(0, 1, &[(3.0, 1.0), (1.0, 2.0), (2.0, 3.0)])];
        let dag = Dag::from_edge_specs(specs.clone(), AccountId(1)).unwrap();
        let ts: Vec<f64> = dag.edge(EdgeId(0)).interactions.iter().map(|i| i.timestamp).collect();
        assert_eq!(ts, vec![1.0, 2.0, 3.0]);
        // The input is untouched.
        assert_eq!(specs[0].interactions[0].timestamp, 3.0);
    }

    #[test]
    fn empty_edge_set_is_rejected() {
        let err = Dag::from_edge_specs(vec![], AccountId(0)).unwrap_err();
        assert!(matches!(err, FlowError::InvalidEdgeSet { .. }));
    }

    #[test]
    fn edge_leaving_distinct_sink_is_rejected() {
        let err = Dag::from_edge_specs(
            vec![spec(0, 1, &[(0.0, 1.0)]), spec(1, 2, &[(1.0, 1.0)])],
            AccountId(1),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidEdgeSet { .. }));
    }

    #[test]
    fn rebuild_keeps_source_first_and_composes_labels() {
        let dag = Dag::from_edge_specs(
            vec![
                spec(1, 2, &[(0.0, 1.0)]),
                spec(2, 9, &[(1.0, 1.0)]),
                spec(1, 3, &[(0.0, 1.0)]),
                spec(3, 9, &[(2.0, 1.0)]),
            ],
            AccountId(9),
        )
        .unwrap();

        // Drop the 1->2 and 2->9 branch; the first remaining edge is 1->3.
        let rebuilt = dag
            .rebuild(|_, e| e.src != NodeId(1) && e.dest != NodeId(1))
            .unwrap();
        assert_eq!(rebuilt.node_count(), 3);
        assert_eq!(rebuilt.edge_count(), 2);
        assert_eq!(
            rebuilt.labels(),
            &[AccountId(1), AccountId(3), AccountId(9)]
        );
        rebuilt.check_adjacency().unwrap();
    }

    #[test]
    fn from_dag_edges_moves_a_source_edge_to_front() {
        let dag = Dag::from_edge_specs(
            vec![spec(0, 1, &[(0.0, 1.0)]), spec(1, 2, &[(1.0, 1.0)])],
            AccountId(2),
        )
        .unwrap();
        let edges = vec![dag.edge(EdgeId(1)).clone(), dag.edge(EdgeId(0)).clone()];
        let rebuilt = Dag::from_dag_edges(&dag, edges).unwrap();
        assert_eq!(rebuilt.edge(EdgeId(0)).src, rebuilt.source());
        assert_eq!(rebuilt.labels(), dag.labels());
    }

    #[test]
    fn from_dag_edges_keeps_the_other_edges_in_order() {
        let dag = Dag::from_edge_specs(
            vec![
                spec(0, 1, &[(0.0, 1.0)]),
                spec(1, 2, &[(1.0, 1.0)]),
                spec(1, 3, &[(1.0, 1.0)]),
                spec(0, 2, &[(0.0, 1.0)]),
            ],
            AccountId(3),
        )
        .unwrap();
        let edges = (1..4).map(|i| dag.edge(EdgeId(i)).clone()).collect();
        let rebuilt = Dag::from_dag_edges(&dag, edges).unwrap();
        let dests: Vec<AccountId> = rebuilt
            .edges()
            .iter()
            .map(|e| rebuilt.label(e.dest))
            .collect();
        assert_eq!(dests, vec![AccountId(2), AccountId(2), AccountId(3)]);
        assert_eq!(rebuilt.label(rebuilt.edge(EdgeId(1)).src), AccountId(1));
    }

    #[test]
    fn from_dag_edges_without_source_edge_fails() {
        let dag = Dag::from_edge_specs(
            vec![spec(0, 1, &[(0.0, 1.0)]), spec(1, 2, &[(1.0, 1.0)])],
            AccountId(2),
        )
        .unwrap();
        let err = Dag::from_dag_edges(&dag, vec![dag.edge(EdgeId(1)).clone()]).unwrap_err();
        assert!(matches!(err, FlowError::InvalidEdgeSet { .. }));
    }
}
