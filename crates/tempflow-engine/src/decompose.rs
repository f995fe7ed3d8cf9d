//! Chain decomposition: collapse pass-through chains hanging off the source,
//! then solve what is left exactly.
//!
//! A pass-through node has exactly one incoming and one outgoing edge. When
//! a source edge leads into one, the chain is walked to the first node that
//! is not pass-through and replaced by a single source edge to that node,
//! whose interactions are the chain's greedy sink arrivals (greedy is exact
//! on a chain). If the source already has an edge to the chain end, the
//! streams are merged instead. Passes repeat until nothing collapses, since
//! a merge can turn the chain end itself into a pass-through node.
//!
//! The working copy keeps its own source edge list and incoming lists; the
//! input DAG is never modified.

use std::path::Path;

use serde::Serialize;

use tempflow_core::interaction::sort_by_time;
use tempflow_core::{write_dag_file, Dag, Edge, EdgeId, Interaction, LabelMode, NodeId};

use crate::error::EngineError;
use crate::exact::exact_flow_with;
use crate::greedy::chain_flow;
use crate::lp::{LpBackend, MinilpBackend};

/// Result of [`decompose`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub value: f64,
    /// Number of chains collapsed.
    pub chains: usize,
    /// Number of scans over the source edges.
    pub passes: usize,
    pub reduced_nodes: usize,
    pub reduced_edges: usize,
}

/// Decomposes with the default LP backend. If `dump` is given, the reduced
/// DAG is always written there before it is solved, even when a single edge
/// remains.
pub fn decompose(dag: &Dag, dump: Option<&Path>) -> Result<Decomposition, EngineError> {
    decompose_with(dag, &MinilpBackend, dump)
}

pub fn decompose_with<B>(
    dag: &Dag,
    backend: &B,
    dump: Option<&Path>,
) -> Result<Decomposition, EngineError>
where
    B: LpBackend + ?Sized,
{
    let mut work = Working::new(dag);
    work.collapse_chains();

    let absorbed = &work.absorbed;
    let kept: Vec<Edge> = work
        .edges
        .iter()
        .filter(|e| !absorbed[e.src.index()] && !absorbed[e.dest.index()])
        .cloned()
        .collect();

    let reduced_nodes = absorbed.iter().filter(|a| !**a).count();
    let reduced_edges = kept.len();

    // Source edges are never absorbed, so some kept edge leaves the source.
    let reduced = Dag::from_dag_edges(dag, kept)?;
    if let Some(path) = dump {
        write_dag_file(&reduced, path, LabelMode::Dag)?;
    }
    let value = exact_flow_with(&reduced, backend)?.value;

    tracing::debug!(
        chains = work.chains,
        passes = work.passes,
        nodes = reduced_nodes,
        edges = reduced_edges,
        value,
        "decomposed DAG"
    );
    Ok(Decomposition {
        value,
        chains: work.chains,
        passes: work.passes,
        reduced_nodes,
        reduced_edges,
    })
}

struct Working<'d> {
    dag: &'d Dag,
    edges: Vec<Edge>,
    /// Live outgoing edges of the source.
    from_source: Vec<EdgeId>,
    incoming: Vec<Vec<EdgeId>>,
    absorbed: Vec<bool>,
    chains: usize,
    passes: usize,
}

impl<'d> Working<'d> {
    fn new(dag: &'d Dag) -> Self {
        Working {
            dag,
            edges: dag.edges().to_vec(),
            from_source: dag.outgoing(dag.source()).to_vec(),
            incoming: dag.nodes().iter().map(|n| n.incoming.to_vec()).collect(),
            absorbed: vec![false; dag.node_count()],
            chains: 0,
            passes: 0,
        }
    }

    /// Out-degrees of non-source nodes never change, only in-degrees do.
    fn pass_through(&self, node: NodeId) -> bool {
        self.incoming[node.index()].len() == 1 && self.dag.outgoing(node).len() == 1
    }

    fn collapse_chains(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            self.passes += 1;

            let mut i = 0;
            while i < self.from_source.len() {
                let head = self.from_source[i];
                let first = self.edges[head.index()].dest;
                if self.absorbed[first.index()] || !self.pass_through(first) {
                    i += 1;
                    continue;
                }
                changed = true;
                self.chains += 1;
                if self.collapse(i, head, first) {
                    i += 1;
                }
            }
        }
    }

    /// Collapses the chain entered by source edge `head`. Returns `false` if
    /// `head` was merged away and removed from the source edge list.
    fn collapse(&mut self, i: usize, head: EdgeId, first: NodeId) -> bool {
        let mut chain = vec![head];
        let mut prev = first;
        let mut end = first;
        while self.pass_through(end) {
            prev = end;
            self.absorbed[prev.index()] = true;
            let next = self.dag.outgoing(prev)[0];
            chain.push(next);
            end = self.edges[next.index()].dest;
        }

        let streams: Vec<&[Interaction]> = chain
            .iter()
            .map(|e| self.edges[e.index()].interactions.as_slice())
            .collect();
        let arrivals = chain_flow(&streams).sink_arrivals;

        let prev_entry = self.incoming[end.index()]
            .iter()
            .position(|e| self.edges[e.index()].src == prev);

        let existing = self
            .from_source
            .iter()
            .copied()
            .find(|e| self.edges[e.index()].dest == end);

        match existing {
            Some(target) => {
                let merged = &mut self.edges[target.index()].interactions;
                merged.extend(arrivals);
                sort_by_time(merged);
                self.from_source.swap_remove(i);
                if let Some(p) = prev_entry {
                    self.incoming[end.index()].swap_remove(p);
                }
                false
            }
            None => {
                let edge = &mut self.edges[head.index()];
                edge.dest = end;
                edge.interactions = arrivals;
                if let Some(p) = prev_entry {
                    self.incoming[end.index()][p] = head;
                }
                true
            }
        }
    }
}
