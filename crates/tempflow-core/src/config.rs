//! Tuning knobs for path enumeration and the flow engines.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Configuration shared by the enumerator, the engines and the pipeline.
///
/// Missing fields in a JSON document fall back to [`FlowConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Maximum number of accounts on an enumerated path. Default: 4.
    pub max_path_len: usize,

    /// Capacity of the collected edge set. Default: 100 000.
    pub max_edges: usize,

    /// Quantity available at the source for the greedy engine.
    /// `None` means unlimited.
    pub source_capacity: Option<f64>,

    /// DAGs holding more interactions than this skip the exact engine and
    /// the decomposer. Default: 10 000.
    pub exact_interaction_limit: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            max_path_len: 4,
            max_edges: 100_000,
            source_capacity: None,
            exact_interaction_limit: 10_000,
        }
    }
}

impl FlowConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json(text: &str) -> Result<Self, FlowError> {
        let config: FlowConfig =
            serde_json::from_str(text).map_err(|e| FlowError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.max_path_len < 2 {
            return Err(invalid(format!(
                "max_path_len must be at least 2, got {}",
                self.max_path_len
            )));
        }
        if self.max_edges == 0 {
            return Err(invalid("max_edges must be at least 1".to_string()));
        }
        if let Some(capacity) = self.source_capacity {
            if !capacity.is_finite() || capacity <= 0.0 {
                return Err(invalid(format!(
                    "source_capacity must be finite and positive, got {}",
                    capacity
                )));
            }
        }
        Ok(())
    }

    /// Source buffer for the greedy engine.
    pub fn source_buffer(&self) -> f64 {
        self.source_capacity.unwrap_or(f64::INFINITY)
    }
}

fn invalid(reason: String) -> FlowError {
    FlowError::InvalidConfig { reason }
}
