//! Topological ordering of a DAG with cycle detection.
//!
//! Three-color depth-first search (unvisited / in progress / done) rooted at
//! the source, emitting nodes in reverse finish order. An edge into an
//! in-progress node is a back edge, which means the edge set is not acyclic.
//!
//! The search uses an explicit stack, so deep DAGs cannot overflow the call
//! stack. Nodes the source cannot reach are explored afterwards and end up
//! ahead of the source's part of the order; when every node is reachable
//! (the normal case) the source comes first.

use crate::dag::Dag;
use crate::error::FlowError;
use crate::id::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Returns the nodes of `dag` in topological order.
///
/// Fails with [`FlowError::CycleDetected`] (and no order) if a back edge is
/// found.
pub fn topological_order(dag: &Dag) -> Result<Vec<NodeId>, FlowError> {
    let n = dag.node_count();
    let mut marks = vec![Mark::Unvisited; n];
    let mut finished: Vec<NodeId> = Vec::with_capacity(n);
    // (node, index of the next outgoing edge to examine)
    let mut stack: Vec<(NodeId, usize)> = Vec::new();

    let roots = std::iter::once(dag.source()).chain((1..n as u32).map(NodeId));
    for root in roots {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }
        marks[root.index()] = Mark::InProgress;
        stack.push((root, 0));

        while let Some(&mut (node, ref mut next)) = stack.last_mut() {
            let outgoing = dag.outgoing(node);
            if *next < outgoing.len() {
                let child = dag.edge(outgoing[*next]).dest;
                *next += 1;
                match marks[child.index()] {
                    Mark::Unvisited => {
                        marks[child.index()] = Mark::InProgress;
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        tracing::debug!(node = %child, "back edge found, not a DAG");
                        return Err(FlowError::CycleDetected { node: child });
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node.index()] = Mark::Done;
                finished.push(node);
                stack.pop();
            }
        }
    }

    finished.reverse();
    Ok(finished)
}
