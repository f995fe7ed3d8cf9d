//! Exact flow engine: a linear program over individual interactions.
//!
//! Every interaction that does not leave the source is a decision variable
//! `x_i` (how much of it is actually used). Interactions leaving the source
//! are unconditional supply. For each variable two rows are emitted:
//!
//! - capacity: `x_i <= quantity_i`
//! - causality: with `u` the node `i` leaves and `t` its timestamp,
//!   `x_i - sum(x_s : s enters u before t) + sum(x_s : s leaves u at or before t)
//!   <= sum(quantity_s : s enters u from the source before t)`
//!
//! so nothing is forwarded before it has arrived and not yet been spent.
//! Arrivals count only strictly before `t`; departures at the same instant
//! share one balance.
//! The objective maximizes the variables entering the sink; direct
//! source-to-sink interactions are added outside the LP.

use tempflow_core::interaction::sort_by_time;
use tempflow_core::{Dag, Interaction, NodeId};

use crate::error::EngineError;
use crate::greedy::FlowResult;
use crate::lp::{LpBackend, LpModel, MinilpBackend};

/// LP values at or below this are treated as zero.
const ZERO_TOLERANCE: f64 = 1e-9;

/// An interaction tagged with its position in the DAG, scoped to one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CompleteInteraction {
    src: NodeId,
    dest: NodeId,
    timestamp: f64,
    quantity: f64,
    /// LP column; `None` for interactions leaving the source.
    column: Option<usize>,
}

/// Flattened view of a DAG's interactions.
struct Flattened {
    inters: Vec<CompleteInteraction>,
    /// Per node, indices into `inters` entering it.
    incoming: Vec<Vec<usize>>,
    /// Per node, indices into `inters` leaving it.
    outgoing: Vec<Vec<usize>>,
    /// Index into `inters` of every column.
    columns: Vec<usize>,
}

fn flatten(dag: &Dag) -> Flattened {
    let source = dag.source();
    let mut flat = Flattened {
        inters: Vec::with_capacity(dag.interaction_count()),
        incoming: vec![Vec::new(); dag.node_count()],
        outgoing: vec![Vec::new(); dag.node_count()],
        columns: Vec::new(),
    };

    for edge in dag.edges() {
        for i in &edge.interactions {
            let n = flat.inters.len();
            let column = (edge.src != source).then(|| {
                flat.columns.push(n);
                flat.columns.len() - 1
            });
            flat.incoming[edge.dest.index()].push(n);
            flat.outgoing[edge.src.index()].push(n);
            flat.inters.push(CompleteInteraction {
                src: edge.src,
                dest: edge.dest,
                timestamp: i.timestamp,
                quantity: i.quantity,
                column,
            });
        }
    }
    flat
}

fn build_model(dag: &Dag, flat: &Flattened) -> Result<LpModel, EngineError> {
    let mut model = LpModel::new(flat.columns.len());

    for (col, &i) in flat.columns.iter().enumerate() {
        let inter = &flat.inters[i];
        model.add_le(vec![(col, 1.0)], inter.quantity)?;

        let mut row = vec![(col, 1.0)];
        let mut supply = 0.0;
        for &s in &flat.incoming[inter.src.index()] {
            let other = &flat.inters[s];
            if other.timestamp >= inter.timestamp {
                continue;
            }
            match other.column {
                None => supply += other.quantity,
                Some(c) => row.push((c, -1.0)),
            }
        }
        for &s in &flat.outgoing[inter.src.index()] {
            let other = &flat.inters[s];
            if s == i || other.timestamp > inter.timestamp {
                continue;
            }
            if let Some(c) = other.column {
                row.push((c, 1.0));
            }
        }
        model.add_le(row, supply)?;
    }

    let sink = dag.sink();
    let objective = flat
        .columns
        .iter()
        .enumerate()
        .filter_map(|(col, &i)| (flat.inters[i].dest == sink).then_some((col, 1.0)))
        .collect();
    model.set_objective(objective)?;
    Ok(model)
}

/// Computes the maximum causal flow with the default LP backend.
pub fn exact_flow(dag: &Dag) -> Result<FlowResult, EngineError> {
    exact_flow_with(dag, &MinilpBackend)
}

/// Computes the maximum causal flow with the given LP backend.
pub fn exact_flow_with<B>(dag: &Dag, backend: &B) -> Result<FlowResult, EngineError>
where
    B: LpBackend + ?Sized,
{
    let flat = flatten(dag);
    let source = dag.source();
    let sink = dag.sink();

    let mut sink_arrivals: Vec<Interaction> = flat
        .inters
        .iter()
        .filter(|i| i.src == source && i.dest == sink)
        .map(|i| Interaction::new(i.timestamp, i.quantity))
        .collect();
    let direct: f64 = sink_arrivals.iter().map(|i| i.quantity).sum();

    let value = if flat.columns.is_empty() {
        direct
    } else {
        let model = build_model(dag, &flat)?;
        tracing::debug!(
            columns = model.columns(),
            rows = model.rows().len(),
            "solving flow LP"
        );
        let solution = backend.solve(&model)?;
        for (col, &i) in flat.columns.iter().enumerate() {
            let inter = &flat.inters[i];
            let used = solution.values[col];
            if inter.dest == sink && used > ZERO_TOLERANCE {
                sink_arrivals.push(Interaction::new(inter.timestamp, used));
            }
        }
        // The solver can return -0.0 or a tiny negative residue.
        let value = solution.objective + direct;
        if value > 0.0 {
            value
        } else {
            0.0
        }
    };

    sort_by_time(&mut sink_arrivals);
    Ok(FlowResult {
        value,
        sink_arrivals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::LpSolution;
    use tempflow_core::{AccountId, EdgeSpec};

    fn dag(edges: &[(u32, u32, &[(f64, f64)])], sink: u32) -> Dag {
        let specs = edges
            .iter()
            .map(|&(src, dest, inters)| EdgeSpec {
                src: AccountId(src),
                dest: AccountId(dest),
                interactions: inters.iter().map(|&(t, q)| Interaction::new(t, q)).collect(),
            })
            .collect();
        Dag::from_edge_specs(specs, AccountId(sink)).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    struct FailingBackend;

    impl LpBackend for FailingBackend {
        fn solve(&self, _model: &LpModel) -> Result<LpSolution, EngineError> {
            Err(EngineError::SolverFailure {
                reason: "no solver".into(),
            })
        }
    }

    #[test]
    fn direct_edge_skips_the_solver() {
        let d = dag(&[(0, 1, &[(1.0, 3.0), (0.0, 5.0)])], 1);
        let result = exact_flow_with(&d, &FailingBackend).unwrap();
        assert_eq!(result.value, 8.0);
        assert_eq!(
            result.sink_arrivals,
            vec![Interaction::new(0.0, 5.0), Interaction::new(1.0, 3.0)]
        );
    }

    #[test]
    fn model_has_two_rows_per_variable() {
        let d = dag(
            &[(0, 1, &[(0.0, 10.0)]), (1, 2, &[(1.0, 4.0), (2.0, 20.0)])],
            2,
        );
        let flat = flatten(&d);
        assert_eq!(flat.columns.len(), 2);
        let model = build_model(&d, &flat).unwrap();
        assert_eq!(model.rows().len(), 4);
        // Causal row of the second transfer: x1 + x0 <= 10.
        assert_eq!(model.rows()[3].coefficients, vec![(1, 1.0), (0, 1.0)]);
        assert_eq!(model.rows()[3].rhs, 10.0);
    }

    #[test]
    fn two_hop_flow() {
        let d = dag(
            &[(0, 1, &[(0.0, 10.0)]), (1, 2, &[(1.0, 4.0), (2.0, 20.0)])],
            2,
        );
        let result = exact_flow(&d).unwrap();
        assert!(close(result.value, 10.0));
        let arrived: f64 = result.sink_arrivals.iter().map(|i| i.quantity).sum();
        assert!(close(arrived, 10.0));
    }

    #[test]
    fn beats_greedy_when_a_node_must_choose() {
        // Greedy sends everything from 1 to 2 at t=1, but only 2 can leave 2.
        let d = dag(
            &[
                (0, 1, &[(0.0, 10.0)]),
                (1, 2, &[(1.0, 10.0)]),
                (1, 3, &[(2.0, 10.0)]),
                (2, 3, &[(3.0, 2.0)]),
            ],
            3,
        );
        let greedy =
            crate::greedy::greedy_flow(&d, &tempflow_core::FlowConfig::default()).unwrap();
        let exact = exact_flow(&d).unwrap();
        assert!(close(greedy.value, 2.0));
        assert!(close(exact.value, 10.0));
    }

    #[test]
    fn nothing_arrives_in_time() {
        let d = dag(&[(0, 1, &[(5.0, 10.0)]), (1, 2, &[(1.0, 4.0)])], 2);
        let result = exact_flow(&d).unwrap();
        assert!(close(result.value, 0.0));
        assert!(result.sink_arrivals.is_empty());
    }

    #[test]
    fn same_instant_departures_share_the_balance() {
        // 10 reaches 1 and is offered to two transfers at t=1.
        let d = dag(
            &[
                (0, 1, &[(0.0, 10.0)]),
                (1, 2, &[(1.0, 10.0)]),
                (1, 3, &[(1.0, 10.0)]),
                (2, 4, &[(2.0, 10.0)]),
                (3, 4, &[(2.0, 10.0)]),
            ],
            4,
        );
        let flat = flatten(&d);
        let model = build_model(&d, &flat).unwrap();
        // Causal row of 1 -> 3: x1 + x0 <= 10.
        assert_eq!(model.rows()[3].coefficients, vec![(1, 1.0), (0, 1.0)]);

        let result = exact_flow(&d).unwrap();
        assert!(close(result.value, 10.0));
    }

    #[test]
    fn arrival_at_departure_instant_is_not_usable() {
        let d = dag(&[(0, 1, &[(1.0, 5.0)]), (1, 2, &[(1.0, 5.0)])], 2);
        let result = exact_flow(&d).unwrap();
        assert_eq!(result.value, 0.0);
        assert!(result.sink_arrivals.is_empty());
    }

    struct NegativeZeroBackend;

    impl LpBackend for NegativeZeroBackend {
        fn solve(&self, model: &LpModel) -> Result<LpSolution, EngineError> {
            Ok(LpSolution {
                objective: -0.0,
                values: vec![0.0; model.columns()],
            })
        }
    }

    #[test]
    fn zero_flow_is_never_negative() {
        let d = dag(&[(0, 1, &[(1.0, 5.0)]), (1, 2, &[(1.0, 5.0)])], 2);
        let result = exact_flow_with(&d, &NegativeZeroBackend).unwrap();
        assert_eq!(result.value, 0.0);
        assert!(result.value.is_sign_positive());
    }

    #[test]
    fn solver_failure_propagates() {
        let d = dag(&[(0, 1, &[(0.0, 1.0)]), (1, 2, &[(1.0, 1.0)])], 2);
        let err = exact_flow_with(&d, &FailingBackend).unwrap_err();
        assert!(matches!(err, EngineError::SolverFailure { .. }));
    }
}
