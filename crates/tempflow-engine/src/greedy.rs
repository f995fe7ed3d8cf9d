//! Greedy flow engine: one global timestamp-ordered pass over all edges.
//!
//! Every node holds a buffer. The source starts with the configured
//! capacity (unlimited by default), everything else with zero. Interactions
//! of all edges are merged in ascending timestamp order through a
//! [`MergeHeap`]; each one moves `min(buffer[src], quantity)` from its
//! source buffer to its destination buffer. Whatever has reached the sink
//! buffer at the end is the flow.
//!
//! Interactions sharing a timestamp run in descending topological rank of
//! their source, so a node spends before it receives within one instant and
//! nothing is forwarded at the instant it arrives.
//!
//! The merge never looks ahead, so a node fed by several edges can commit
//! its buffer to an early outgoing interaction that an optimal schedule
//! would have saved for a later, larger one. The result is a lower bound on
//! the exact flow.

use std::cmp::Reverse;

use serde::Serialize;

use tempflow_core::{topological_order, Dag, FlowConfig, Interaction, MergeHeap, NodeId};

use crate::error::EngineError;

/// Flow value with the transfers that delivered it into the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowResult {
    pub value: f64,
    /// Positive sink-bound transfers, ascending by timestamp.
    pub sink_arrivals: Vec<Interaction>,
}

/// Runs the greedy engine over a whole DAG.
pub fn greedy_flow(dag: &Dag, config: &FlowConfig) -> Result<FlowResult, EngineError> {
    let order = topological_order(dag)?;
    Ok(greedy_flow_ordered(dag, &order, config))
}

/// Same as [`greedy_flow`] with the topological order already computed.
pub fn greedy_flow_ordered(dag: &Dag, order: &[NodeId], config: &FlowConfig) -> FlowResult {
    let mut rank = vec![0usize; dag.node_count()];
    for (pos, node) in order.iter().enumerate() {
        if let Some(slot) = rank.get_mut(node.index()) {
            *slot = pos;
        }
    }

    let mut streams: Vec<Stream<'_>> = dag
        .edges()
        .iter()
        .map(|e| Stream {
            src: e.src.index(),
            dest: e.dest.index(),
            interactions: &e.interactions,
        })
        .collect();
    streams.sort_by_key(|s| Reverse(rank[s.src]));
    let result = merge(
        &streams,
        dag.node_count(),
        dag.sink().index(),
        config.source_buffer(),
    );
    tracing::debug!(
        edges = dag.edge_count(),
        value = result.value,
        "greedy flow"
    );
    result
}

/// Runs the greedy engine over a chain of interaction streams, where stream
/// `k` moves quantity from position `k` to position `k + 1`. The source is
/// position 0 and unlimited.
pub fn chain_flow(chain: &[&[Interaction]]) -> FlowResult {
    let streams: Vec<Stream<'_>> = chain
        .iter()
        .enumerate()
        .rev()
        .map(|(k, interactions)| Stream {
            src: k,
            dest: k + 1,
            interactions,
        })
        .collect();
    merge(&streams, chain.len() + 1, chain.len(), f64::INFINITY)
}

/// One edge's interaction stream between two buffer slots.
struct Stream<'a> {
    src: usize,
    dest: usize,
    interactions: &'a [Interaction],
}

/// The k-way merge shared by [`greedy_flow`] and [`chain_flow`]. Slot 0 is
/// the source. At equal timestamps earlier streams run first.
fn merge(streams: &[Stream<'_>], slots: usize, sink: usize, source_buffer: f64) -> FlowResult {
    let mut buffer = vec![0.0f64; slots];
    buffer[0] = source_buffer;
    let mut cursor = vec![0usize; streams.len()];
    let mut sink_arrivals = Vec::new();

    let mut heap = MergeHeap::with_capacity(streams.len());
    for (i, stream) in streams.iter().enumerate() {
        if let Some(first) = stream.interactions.first() {
            heap.insert(first.timestamp, i as u32);
        }
    }

    while let Some(top) = heap.peek() {
        let i = top.tag as usize;
        let stream = &streams[i];
        let current = stream.interactions[cursor[i]];

        let flow = buffer[stream.src].min(current.quantity);
        buffer[stream.src] -= flow;
        buffer[stream.dest] += flow;
        if stream.dest == sink && flow > 0.0 {
            sink_arrivals.push(Interaction::new(top.key, flow));
        }

        cursor[i] += 1;
        match stream.interactions.get(cursor[i]) {
            Some(next) => heap.replace_top(next.timestamp),
            None => {
                heap.remove_top();
            }
        }
    }

    FlowResult {
        value: buffer[sink],
        sink_arrivals,
    }
}
