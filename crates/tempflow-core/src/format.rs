//! Text formats: the transaction graph reader and the DAG dump writer.
//!
//! Graph file layout (fields separated by any whitespace, blank lines
//! ignored):
//!
//! ```text
//! <account count>
//! <src> <out degree>
//! <src> <dest> <n> <ts1> <qty1> ... <tsn> <qtyn>     (out degree lines)
//! ...
//! ```
//!
//! Accounts that never head a block are legal and stay addressable.
//!
//! The DAG dump is `<node count>` followed by one `<src> <dest> <ts> <qty>`
//! line per interaction, capped at [`DUMP_INTERACTIONS_PER_EDGE`] per edge.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dag::Dag;
use crate::error::FlowError;
use crate::graph::TransactionGraph;
use crate::id::{AccountId, NodeId};
use crate::interaction::Interaction;

/// Maximum interactions written per edge by [`write_dag`].
pub const DUMP_INTERACTIONS_PER_EDGE: usize = 5;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads a transaction graph.
pub fn read_graph<R: BufRead>(reader: R) -> Result<TransactionGraph, FlowError> {
    let mut lines = Lines::new(reader);

    let (line, header) = lines
        .next_fields()?
        .ok_or_else(|| malformed(1, "missing account count"))?;
    let count: u32 = parse(line, &header[0], "account count")?;
    let mut graph = TransactionGraph::with_accounts(count);

    while let Some((line, block)) = lines.next_fields()? {
        if block.len() != 2 {
            return Err(malformed(
                line,
                format!("expected `<src> <out degree>`, found {} fields", block.len()),
            ));
        }
        let src = account(&graph, line, &block[0])?;
        let degree: usize = parse(line, &block[1], "out degree")?;

        for _ in 0..degree {
            let (line, fields) = lines
                .next_fields()?
                .ok_or_else(|| {
                    malformed(
                        lines.line,
                        format!("edge block of account {} is truncated", src),
                    )
                })?;
            if fields.len() < 3 {
                return Err(malformed(line, "expected `<src> <dest> <n> ...`"));
            }
            let edge_src = account(&graph, line, &fields[0])?;
            if edge_src != src {
                return Err(malformed(
                    line,
                    format!("edge source {} inside the block of account {}", edge_src, src),
                ));
            }
            let dest = account(&graph, line, &fields[1])?;
            let n: usize = parse(line, &fields[2], "interaction count")?;
            if fields.len() != 3 + 2 * n {
                return Err(malformed(
                    line,
                    format!(
                        "{} interactions need {} fields, found {}",
                        n,
                        3 + 2 * n,
                        fields.len()
                    ),
                ));
            }

            let interactions = fields[3..]
                .chunks_exact(2)
                .map(|pair| {
                    Ok(Interaction::new(
                        parse(line, &pair[0], "timestamp")?,
                        parse(line, &pair[1], "quantity")?,
                    ))
                })
                .collect::<Result<Vec<_>, FlowError>>()?;
            graph.add_edge(src, dest, interactions)?;
        }
    }

    tracing::info!(
        accounts = graph.account_count(),
        edges = graph.edge_count(),
        interactions = graph.interaction_count(),
        "read transaction graph"
    );
    Ok(graph)
}

/// Reads a transaction graph from a file.
pub fn read_graph_file(path: impl AsRef<Path>) -> Result<TransactionGraph, FlowError> {
    let file = File::open(path)?;
    read_graph(std::io::BufReader::new(file))
}

/// Non-blank lines split into fields, with 1-based line numbers.
struct Lines<R> {
    inner: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Lines {
            inner: reader.lines(),
            line: 0,
        }
    }

    fn next_fields(&mut self) -> Result<Option<(usize, Vec<String>)>, FlowError> {
        for text in self.inner.by_ref() {
            let text = text?;
            self.line += 1;
            let fields: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
            if !fields.is_empty() {
                return Ok(Some((self.line, fields)));
            }
        }
        Ok(None)
    }
}

fn parse<T: FromStr>(line: usize, field: &str, what: &str) -> Result<T, FlowError> {
    field
        .parse()
        .map_err(|_| malformed(line, format!("invalid {}: `{}`", what, field)))
}

fn account(graph: &TransactionGraph, line: usize, field: &str) -> Result<AccountId, FlowError> {
    let id = AccountId(parse(line, field, "account id")?);
    if graph.contains(id) {
        Ok(id)
    } else {
        Err(malformed(
            line,
            format!("account {} out of range 0..{}", id, graph.account_count()),
        ))
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> FlowError {
    FlowError::MalformedInput {
        line,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Which labels a DAG dump prints for edge endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelMode {
    /// Contiguous DAG node ids.
    #[default]
    Dag,
    /// Account labels of the transaction graph.
    Original,
}

/// Writes the bounded visualization dump of a DAG.
pub fn write_dag<W: Write>(dag: &Dag, out: &mut W, mode: LabelMode) -> Result<(), FlowError> {
    let label = |n: NodeId| match mode {
        LabelMode::Dag => n.0,
        LabelMode::Original => dag.label(n).0,
    };

    writeln!(out, "{}", dag.node_count())?;
    for edge in dag.edges() {
        for i in edge.interactions.iter().take(DUMP_INTERACTIONS_PER_EDGE) {
            writeln!(
                out,
                "{} {} {:.1} {:.1}",
                label(edge.src),
                label(edge.dest),
                i.timestamp,
                i.quantity
            )?;
        }
    }
    Ok(())
}

/// Writes the DAG dump to `path`, replacing any existing file.
pub fn write_dag_file(dag: &Dag, path: impl AsRef<Path>, mode: LabelMode) -> Result<(), FlowError> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    write_dag(dag, &mut out, mode)?;
    out.flush()?;
    tracing::debug!(path = %path.as_ref().display(), "wrote DAG dump");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeSpec;

    const SAMPLE: &str = "4\n\
                          0\t2\n\
                          0\t1\t2\t1.0\t5.0\t0.0\t2.5\n\
                          0\t2\t1\t3.0\t1.0\n\
                          \n\
                          1 1\n\
                          1 2 1 4.0 7.0\n";

    fn read(text: &str) -> Result<TransactionGraph, FlowError> {
        read_graph(text.as_bytes())
    }

    fn line_of(err: FlowError) -> usize {
        match err {
            FlowError::MalformedInput { line, .. } => line,
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn reads_sample_graph() {
        let graph = read(SAMPLE).unwrap();
        assert_eq!(graph.account_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.interaction_count(), 4);

        let out = graph.outgoing(AccountId(0));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1, AccountId(1));
        assert_eq!(
            graph.interactions(out[0].0).unwrap(),
            &[Interaction::new(1.0, 5.0), Interaction::new(0.0, 2.5)]
        );

        // Account 3 never heads a block.
        assert_eq!(graph.summary().phantoms, 1);
    }

    #[test]
    fn empty_input_is_malformed() {
        assert_eq!(line_of(read("").unwrap_err()), 1);
    }

    #[test]
    fn bad_account_count_is_malformed() {
        assert_eq!(line_of(read("four\n").unwrap_err()), 1);
    }

    #[test]
    fn source_mismatch_is_malformed() {
        let err = read("3\n0 1\n1 2 1 0.0 1.0\n").unwrap_err();
        assert_eq!(line_of(err), 3);
    }

    #[test]
    fn truncated_block_is_malformed() {
        let err = read("3\n0 2\n0 1 1 0.0 1.0\n").unwrap_err();
        assert_eq!(line_of(err), 3);
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let err = read("3\n0 1\n0 1 2 0.0 1.0 5.0\n").unwrap_err();
        assert_eq!(line_of(err), 3);
    }

    #[test]
    fn out_of_range_account_is_malformed() {
        let err = read("2\n0 1\n0 5 1 0.0 1.0\n").unwrap_err();
        assert_eq!(line_of(err), 3);
    }

    #[test]
    fn unparsable_quantity_is_malformed() {
        let err = read("2\n0 1\n0 1 1 0.0 lots\n").unwrap_err();
        assert_eq!(line_of(err), 3);
    }

    fn dump_dag() -> Dag {
        let inter = |t: f64| Interaction::new(t, t * 2.0);
        Dag::from_edge_specs(
            vec![
                EdgeSpec {
                    src: AccountId(7),
                    dest: AccountId(3),
                    interactions: (0..7).map(|t| inter(t as f64)).collect(),
                },
                EdgeSpec {
                    src: AccountId(3),
                    dest: AccountId(9),
                    interactions: vec![Interaction::new(2.5, 1.0)],
                },
            ],
            AccountId(9),
        )
        .unwrap()
    }

    #[test]
    fn dump_caps_interactions_per_edge() {
        let mut out = Vec::new();
        write_dag(&dump_dag(), &mut out, LabelMode::Dag).unwrap();
        let text = String::from_utf8(out).unwrap();
        insta::assert_snapshot!(text, @r"
        3
        0 1 0.0 0.0
        0 1 1.0 2.0
        0 1 2.0 4.0
        0 1 3.0 6.0
        0 1 4.0 8.0
        1 2 2.5 1.0
        ");
    }

    #[test]
    fn dump_with_original_labels() {
        let mut out = Vec::new();
        write_dag(&dump_dag(), &mut out, LabelMode::Original).unwrap();
        let text = String::from_utf8(out).unwrap();
        let last = text.lines().last().unwrap();
        assert_eq!(last, "3 9 2.5 1.0");
        assert!(text.lines().nth(1).unwrap().starts_with("7 3 "));
    }
}
