//! Stable ID newtypes for graph entities.
//!
//! Two id spaces exist side by side: [`AccountId`] labels nodes of the raw
//! transaction graph, while [`NodeId`] and [`EdgeId`] index the contiguous
//! arrays of one [`Dag`](crate::dag::Dag) generation. Keeping them distinct
//! types stops a DAG position from being mistaken for an account label.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Account label in the raw transaction graph. Maps to a petgraph `NodeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u32);

/// Node position inside a DAG. `NodeId(0)` is always the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Edge position inside a DAG's edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl NodeId {
    /// Returns the id as an array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    /// Returns the id as an array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridge between AccountId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for AccountId {
    fn from(idx: NodeIndex<u32>) -> Self {
        AccountId(idx.index() as u32)
    }
}

impl From<AccountId> for NodeIndex<u32> {
    fn from(id: AccountId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}
