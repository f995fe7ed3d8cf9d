pub mod config;
pub mod dag;
pub mod error;
pub mod format;
pub mod graph;
pub mod heap;
pub mod id;
pub mod interaction;
pub mod paths;
pub mod preprocess;
pub mod topo;

// Re-export commonly used types
pub use config::FlowConfig;
pub use dag::{Dag, DagNode, Edge};
pub use error::FlowError;
pub use format::{read_graph, read_graph_file, write_dag, write_dag_file, LabelMode};
pub use graph::{EdgeSpec, GraphSummary, TransactionGraph};
pub use heap::MergeHeap;
pub use id::{AccountId, EdgeId, NodeId};
pub use interaction::Interaction;
pub use paths::{find_paths, PathSet};
pub use preprocess::{preprocess, PreprocessOutcome, Preprocessed, PruneStats};
pub use topo::topological_order;
