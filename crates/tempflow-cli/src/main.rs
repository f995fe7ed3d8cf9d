//! Temporal flow analysis CLI.
//!
//! Provides the `tempflow` binary. `single` analyzes one source/sink query
//! and prints the report as pretty JSON; `batch` runs the loop query
//! (sink = source) for every account listed in a file and prints one JSON
//! report per line.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use tempflow_core::{read_graph_file, AccountId, FlowConfig, FlowError, TransactionGraph};
use tempflow_engine::{analyze, AnalyzeOptions, EngineError};

/// Maximum temporal flow between accounts of a transaction graph.
#[derive(Parser)]
#[command(name = "tempflow", about = "Temporal flow analysis of transaction graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Analyze the flow from one source to one sink.
    Single {
        /// Path to the transaction graph file.
        graph: PathBuf,

        /// Source account.
        source: u32,

        /// Sink account (default: the source, i.e. flow back to the origin).
        #[arg(long)]
        sink: Option<u32>,

        #[command(flatten)]
        settings: Settings,
    },

    /// Analyze the loop flow of every account listed in a file.
    Batch {
        /// Path to the transaction graph file.
        graph: PathBuf,

        /// File with one source account per line (first field is used).
        sources: PathBuf,

        #[command(flatten)]
        settings: Settings,
    },
}

/// Options shared by all subcommands. Flags override the config file.
#[derive(Args)]
struct Settings {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of accounts on an enumerated path.
    #[arg(long)]
    max_path_len: Option<usize>,

    /// Capacity of the collected edge set.
    #[arg(long)]
    max_edges: Option<usize>,

    /// Quantity available at the source for the greedy engine.
    #[arg(long)]
    source_capacity: Option<f64>,

    /// Skip the exact stages above this many interactions.
    #[arg(long)]
    exact_limit: Option<usize>,

    /// Directory for DAG dumps.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Single {
            graph,
            source,
            sink,
            settings,
        } => run_single(&graph, source, sink, &settings),
        Commands::Batch {
            graph,
            sources,
            settings,
        } => run_batch(&graph, &sources, &settings),
    };
    process::exit(exit_code);
}

/// Execute the single subcommand.
///
/// Returns exit code: 0 = success, 1 = analysis error, 3 = I/O or input error.
fn run_single(graph_path: &Path, source: u32, sink: Option<u32>, settings: &Settings) -> i32 {
    let (config, graph) = match prepare(graph_path, settings) {
        Ok(ready) => ready,
        Err(code) => return code,
    };
    let options = AnalyzeOptions {
        dump_dir: settings.dump_dir.clone(),
    };

    let source = AccountId(source);
    let sink = AccountId(sink.unwrap_or(source.0));
    match analyze(&graph, source, sink, &config, &options) {
        Ok(report) => {
            let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize report: {}\"}}", e)
            });
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(&e)
        }
    }
}

/// Execute the batch subcommand.
///
/// A failed query is printed as an error line and does not stop the batch.
/// Returns exit code: 0 = success, 3 = I/O or input error.
fn run_batch(graph_path: &Path, sources_path: &Path, settings: &Settings) -> i32 {
    let (config, graph) = match prepare(graph_path, settings) {
        Ok(ready) => ready,
        Err(code) => return code,
    };

    let sources = match fs::read_to_string(sources_path) {
        Ok(text) => match parse_sources(&text) {
            Ok(sources) => sources,
            Err(msg) => {
                eprintln!("Error: {}: {}", sources_path.display(), msg);
                return 3;
            }
        },
        Err(e) => {
            eprintln!(
                "Error: failed to read sources '{}': {}",
                sources_path.display(),
                e
            );
            return 3;
        }
    };

    let mut failed = 0usize;
    for &source in &sources {
        let options = AnalyzeOptions {
            dump_dir: settings
                .dump_dir
                .as_ref()
                .map(|d| d.join(source.0.to_string())),
        };
        let line = match analyze(&graph, source, source, &config, &options) {
            Ok(report) => serde_json::to_string(&report),
            Err(e) => {
                failed += 1;
                tracing::warn!("query {} failed: {}", source, e);
                serde_json::to_string(&serde_json::json!({
                    "source": source,
                    "error": e.to_string(),
                }))
            }
        };
        match line {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Error: failed to serialize report for {}: {}", source, e),
        }
    }

    tracing::info!(
        "batch finished: {} queries, {} failed",
        sources.len(),
        failed
    );
    0
}

/// Loads the configuration and the graph, reporting failures on stderr.
fn prepare(graph_path: &Path, settings: &Settings) -> Result<(FlowConfig, TransactionGraph), i32> {
    let config = load_config(settings).map_err(|e| {
        eprintln!("Error: {}", e);
        3
    })?;
    let graph = read_graph_file(graph_path).map_err(|e| {
        eprintln!(
            "Error: failed to read graph '{}': {}",
            graph_path.display(),
            e
        );
        3
    })?;
    let summary = graph.summary();
    tracing::info!(
        "graph {}: {} accounts ({} phantom), {} edges, {} interactions, total quantity {}",
        graph_path.display(),
        summary.accounts,
        summary.phantoms,
        summary.edges,
        summary.interactions,
        summary.total_quantity
    );
    Ok((config, graph))
}

/// Builds the configuration from the optional file and the flag overrides.
fn load_config(settings: &Settings) -> Result<FlowConfig, FlowError> {
    let mut config = match &settings.config {
        Some(path) => FlowConfig::from_json(&fs::read_to_string(path)?)?,
        None => FlowConfig::default(),
    };
    if let Some(len) = settings.max_path_len {
        config.max_path_len = len;
    }
    if let Some(edges) = settings.max_edges {
        config.max_edges = edges;
    }
    if let Some(capacity) = settings.source_capacity {
        config.source_capacity = Some(capacity);
    }
    if let Some(limit) = settings.exact_limit {
        config.exact_interaction_limit = limit;
    }
    config.validate()?;
    Ok(config)
}

/// First field of every non-blank line, with consecutive duplicates skipped.
fn parse_sources(text: &str) -> Result<Vec<AccountId>, String> {
    let mut sources: Vec<AccountId> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let Some(field) = line.split_whitespace().next() else {
            continue;
        };
        let id = field
            .parse()
            .map(AccountId)
            .map_err(|_| format!("line {}: invalid account id `{}`", i + 1, field))?;
        if sources.last() != Some(&id) {
            sources.push(id);
        }
    }
    Ok(sources)
}

/// Maps an analysis error to the process exit code.
fn exit_code(err: &EngineError) -> i32 {
    match err {
        EngineError::Io(_)
        | EngineError::Core(
            FlowError::Io(_)
            | FlowError::MalformedInput { .. }
            | FlowError::UnknownAccount { .. }
            | FlowError::InvalidConfig { .. },
        ) => 3,
        _ => 1,
    }
}
