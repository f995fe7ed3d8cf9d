//! Timestamped transfer events carried by edges.

use serde::{Deserialize, Serialize};

/// One discrete transfer of `quantity` at `timestamp` along an edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: f64,
    pub quantity: f64,
}

impl Interaction {
    pub fn new(timestamp: f64, quantity: f64) -> Self {
        Interaction {
            timestamp,
            quantity,
        }
    }
}

/// Sorts interactions by ascending timestamp, keeping the input order of ties.
pub fn sort_by_time(interactions: &mut [Interaction]) {
    interactions.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
}

/// Sum of all quantities in a stream.
pub fn total_quantity(interactions: &[Interaction]) -> f64 {
    interactions.iter().map(|i| i.quantity).sum()
}
