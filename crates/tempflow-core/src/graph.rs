//! TransactionGraph: the raw, read-only graph of accounts and transfers.
//!
//! Backed by a petgraph `DiGraph` whose node index equals the account label,
//! so every label in `0..account_count()` is addressable even when the
//! account never appears on an edge (a "phantom" account). Edge weights are
//! the interaction streams, in the order they were read.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::error::FlowError;
use crate::id::AccountId;
use crate::interaction::Interaction;

/// An owned edge description used to seed a DAG.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    pub src: AccountId,
    pub dest: AccountId,
    pub interactions: Vec<Interaction>,
}

/// Size statistics of a transaction graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub accounts: usize,
    pub edges: usize,
    pub interactions: usize,
    pub total_quantity: f64,
    /// Accounts with no incident edges at all.
    pub phantoms: usize,
}

/// The raw transaction graph.
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    inner: DiGraph<AccountId, Vec<Interaction>, u32>,
}

impl TransactionGraph {
    /// Creates a graph with accounts `0..count` and no edges.
    pub fn with_accounts(count: u32) -> Self {
        let mut inner = DiGraph::with_capacity(count as usize, 0);
        for label in 0..count {
            inner.add_node(AccountId(label));
        }
        TransactionGraph { inner }
    }

    /// Adds a directed edge carrying `interactions`.
    ///
    /// Self-loops are stored but never expanded by path enumeration.
    pub fn add_edge(
        &mut self,
        src: AccountId,
        dest: AccountId,
        interactions: Vec<Interaction>,
    ) -> Result<EdgeIndex<u32>, FlowError> {
        self.check(src)?;
        self.check(dest)?;
        Ok(self.inner.add_edge(src.into(), dest.into(), interactions))
    }

    /// Returns `true` if `id` labels an account of this graph.
    pub fn contains(&self, id: AccountId) -> bool {
        (id.0 as usize) < self.inner.node_count()
    }

    fn check(&self, id: AccountId) -> Result<(), FlowError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(FlowError::UnknownAccount { id })
        }
    }

    pub fn account_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Total number of interactions over all edges.
    pub fn interaction_count(&self) -> usize {
        self.inner.edge_weights().map(Vec::len).sum()
    }

    /// Outgoing edges of `id` as `(edge, destination)` pairs, in insertion order.
    pub fn outgoing(&self, id: AccountId) -> Vec<(EdgeIndex<u32>, AccountId)> {
        if !self.contains(id) {
            return Vec::new();
        }
        // petgraph walks its adjacency list newest-first.
        let mut out: Vec<(EdgeIndex<u32>, AccountId)> = self
            .inner
            .edges_directed(id.into(), Direction::Outgoing)
            .map(|e| (e.id(), AccountId::from(e.target())))
            .collect();
        out.reverse();
        out
    }

    /// Endpoints of an edge.
    pub fn endpoints(&self, edge: EdgeIndex<u32>) -> Option<(AccountId, AccountId)> {
        self.inner
            .edge_endpoints(edge)
            .map(|(a, b)| (AccountId::from(a), AccountId::from(b)))
    }

    /// Interaction stream of an edge.
    pub fn interactions(&self, edge: EdgeIndex<u32>) -> Option<&[Interaction]> {
        self.inner.edge_weight(edge).map(Vec::as_slice)
    }

    /// Deep-copies the given edges into owned [`EdgeSpec`]s, preserving order.
    pub fn edge_specs(&self, edges: &[EdgeIndex<u32>]) -> Vec<EdgeSpec> {
        edges
            .iter()
            .filter_map(|&e| {
                let (src, dest) = self.endpoints(e)?;
                let interactions = self.interactions(e)?.to_vec();
                Some(EdgeSpec {
                    src,
                    dest,
                    interactions,
                })
            })
            .collect()
    }

    /// Computes size statistics.
    pub fn summary(&self) -> GraphSummary {
        let phantoms = self
            .inner
            .node_indices()
            .filter(|&n: &NodeIndex<u32>| {
                self.inner
                    .edges_directed(n, Direction::Outgoing)
                    .all(|e| e.target() == n)
                    && self
                        .inner
                        .edges_directed(n, Direction::Incoming)
                        .all(|e| e.source() == n)
            })
            .count();

        GraphSummary {
            accounts: self.account_count(),
            edges: self.edge_count(),
            interactions: self.interaction_count(),
            total_quantity: self
                .inner
                .edge_weights()
                .flat_map(|w| w.iter().map(|i| i.quantity))
                .sum(),
            phantoms,
        }
    }
}
