//! End-to-end analysis of one source/sink query.
//!
//! Stages run in a fixed order: path enumeration, DAG building, topological
//! ordering, greedy flow, exact flow, preprocessing, then exact flow and
//! chain decomposition on the preprocessed DAG. Each flow stage reports
//! its value and wall time, or why it was not run.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use tempflow_core::{
    find_paths, preprocess, topological_order, write_dag_file, AccountId, Dag, FlowConfig,
    LabelMode, PreprocessOutcome, PruneStats, TransactionGraph,
};

use crate::decompose::decompose;
use crate::error::EngineError;
use crate::exact::exact_flow;
use crate::greedy::greedy_flow_ordered;

/// File name of the DAG dump written before preprocessing.
pub const DAG_DUMP: &str = "dag.txt";

/// File name of the reduced DAG dump written by the decomposer.
pub const DECOMPOSED_DUMP: &str = "decomposed.txt";

/// Options for a single [`analyze`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    /// Directory for the DAG dumps. `None` disables them.
    pub dump_dir: Option<PathBuf>,
}

/// How a flow stage ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Computed { value: f64, elapsed_ms: u64 },
    /// Preprocessing proved the flow is zero; the stage was not run.
    ZeroFlow,
    Skipped { reason: String },
}

impl StageOutcome {
    /// The flow value, if the stage produced one.
    pub fn value(&self) -> Option<f64> {
        match self {
            StageOutcome::Computed { value, .. } => Some(*value),
            StageOutcome::ZeroFlow => Some(0.0),
            StageOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    pub nodes: usize,
    pub edges: usize,
    pub interactions: usize,
}

impl SizeReport {
    fn of(dag: &Dag) -> Self {
        SizeReport {
            nodes: dag.node_count(),
            edges: dag.edge_count(),
            interactions: dag.interaction_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreprocessReport {
    /// `unchanged`, `pruned`, `rebuilt` or `zero_flow`.
    pub outcome: String,
    pub stats: PruneStats,
    pub elapsed_ms: u64,
    /// Size of the DAG the later stages run on; `None` on zero flow.
    pub remaining: Option<SizeReport>,
}

/// Everything [`analyze`] found out about one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub source: AccountId,
    pub sink: AccountId,
    pub path_edges: usize,
    pub path_interactions: usize,
    /// Path enumeration hit `max_edges` and dropped paths.
    pub truncated: bool,
    pub dag: SizeReport,
    pub greedy: StageOutcome,
    pub exact: StageOutcome,
    pub preprocess: PreprocessReport,
    pub exact_preprocessed: StageOutcome,
    pub decomposed: StageOutcome,
}

/// Runs every stage for the query `source -> sink`.
pub fn analyze(
    graph: &TransactionGraph,
    source: AccountId,
    sink: AccountId,
    config: &FlowConfig,
    options: &AnalyzeOptions,
) -> Result<FlowReport, EngineError> {
    config.validate()?;

    let paths = find_paths(graph, source, sink, config)?;
    let dag = Dag::from_edge_specs(graph.edge_specs(paths.edges()), sink)?;
    tracing::debug!(
        nodes = dag.node_count(),
        edges = dag.edge_count(),
        interactions = dag.interaction_count(),
        "query DAG"
    );

    if let Some(dir) = &options.dump_dir {
        std::fs::create_dir_all(dir)?;
        write_dag_file(&dag, dir.join(DAG_DUMP), LabelMode::Original)?;
    }

    let order = topological_order(&dag)?;
    let limit = config.exact_interaction_limit;

    let start = Instant::now();
    let greedy = greedy_flow_ordered(&dag, &order, config);
    let greedy = StageOutcome::Computed {
        value: greedy.value,
        elapsed_ms: elapsed_ms(start),
    };

    let exact = if dag.interaction_count() > limit {
        skipped(dag.interaction_count(), limit)
    } else {
        let start = Instant::now();
        let value = exact_flow(&dag)?.value;
        StageOutcome::Computed {
            value,
            elapsed_ms: elapsed_ms(start),
        }
    };

    let start = Instant::now();
    let mut pruned = dag.clone();
    let result = preprocess(&mut pruned, &order)?;
    let preprocess_ms = elapsed_ms(start);

    let (name, reduced) = match result.outcome {
        PreprocessOutcome::Unchanged => ("unchanged", Some(pruned)),
        PreprocessOutcome::Pruned => ("pruned", Some(pruned)),
        PreprocessOutcome::Rebuilt(rebuilt) => ("rebuilt", Some(rebuilt)),
        PreprocessOutcome::ZeroFlow => ("zero_flow", None),
    };

    let preprocess = PreprocessReport {
        outcome: name.to_string(),
        stats: result.stats,
        elapsed_ms: preprocess_ms,
        remaining: reduced.as_ref().map(SizeReport::of),
    };

    let (exact_preprocessed, decomposed) = match &reduced {
        None => (StageOutcome::ZeroFlow, StageOutcome::ZeroFlow),
        Some(reduced) if reduced.interaction_count() > limit => (
            skipped(reduced.interaction_count(), limit),
            skipped(reduced.interaction_count(), limit),
        ),
        Some(reduced) => {
            let start = Instant::now();
            let value = exact_flow(reduced)?.value;
            let exact_preprocessed = StageOutcome::Computed {
                value,
                elapsed_ms: elapsed_ms(start),
            };

            let dump = options.dump_dir.as_ref().map(|d| d.join(DECOMPOSED_DUMP));
            let start = Instant::now();
            let value = decompose(reduced, dump.as_deref())?.value;
            let decomposed = StageOutcome::Computed {
                value,
                elapsed_ms: elapsed_ms(start),
            };
            (exact_preprocessed, decomposed)
        }
    };

    let report = FlowReport {
        source,
        sink,
        path_edges: paths.len(),
        path_interactions: paths.total_interactions(),
        truncated: paths.truncated(),
        dag: SizeReport::of(&dag),
        greedy,
        exact,
        preprocess,
        exact_preprocessed,
        decomposed,
    };

    tracing::info!(
        "flow {} -> {}: greedy {:?}, exact {:?}, preprocess {}",
        source,
        sink,
        report.greedy.value(),
        report.exact.value(),
        report.preprocess.outcome
    );
    Ok(report)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn skipped(interactions: usize, limit: usize) -> StageOutcome {
    tracing::warn!(interactions, limit, "DAG too large for the exact engine");
    StageOutcome::Skipped {
        reason: format!(
            "{} interactions exceed the limit of {}",
            interactions, limit
        ),
    }
}
