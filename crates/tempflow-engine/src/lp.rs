//! The linear-program boundary of the exact engine.
//!
//! [`LpModel`] is a solver-neutral maximization problem over non-negative
//! columns with sparse `<=` rows. Any backend implementing [`LpBackend`]
//! can solve it; [`MinilpBackend`] is the pure-Rust default.

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

use crate::error::EngineError;

/// One sparse `<=` constraint: `sum(coef * x[col]) <= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LpRow {
    pub coefficients: Vec<(usize, f64)>,
    pub rhs: f64,
}

/// A maximization problem over `columns` non-negative variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LpModel {
    columns: usize,
    rows: Vec<LpRow>,
    objective: Vec<(usize, f64)>,
}

impl LpModel {
    /// Creates a model with `columns` variables, no rows and a zero objective.
    pub fn new(columns: usize) -> Self {
        LpModel {
            columns,
            rows: Vec::new(),
            objective: Vec::new(),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> &[LpRow] {
        &self.rows
    }

    pub fn objective(&self) -> &[(usize, f64)] {
        &self.objective
    }

    /// Adds a `<=` row. Column indices must be below [`columns`](Self::columns).
    pub fn add_le(&mut self, coefficients: Vec<(usize, f64)>, rhs: f64) -> Result<(), EngineError> {
        self.check(&coefficients)?;
        self.rows.push(LpRow { coefficients, rhs });
        Ok(())
    }

    /// Sets the maximization objective.
    pub fn set_objective(&mut self, coefficients: Vec<(usize, f64)>) -> Result<(), EngineError> {
        self.check(&coefficients)?;
        self.objective = coefficients;
        Ok(())
    }

    fn check(&self, coefficients: &[(usize, f64)]) -> Result<(), EngineError> {
        match coefficients.iter().find(|(col, _)| *col >= self.columns) {
            Some((col, _)) => Err(EngineError::SolverFailure {
                reason: format!("column {} out of range 0..{}", col, self.columns),
            }),
            None => Ok(()),
        }
    }
}

/// Optimal objective value and the value of every column.
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub objective: f64,
    pub values: Vec<f64>,
}

/// A linear-program solver.
///
/// Implementations either return an optimal solution or fail with
/// [`EngineError::SolverFailure`]; partial results are never returned.
pub trait LpBackend {
    fn solve(&self, model: &LpModel) -> Result<LpSolution, EngineError>;
}

/// Sparse simplex solver from the `minilp` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinilpBackend;

impl LpBackend for MinilpBackend {
    fn solve(&self, model: &LpModel) -> Result<LpSolution, EngineError> {
        let mut problem = Problem::new(OptimizationDirection::Maximize);

        let mut objective = vec![0.0f64; model.columns];
        for &(col, coef) in &model.objective {
            objective[col] += coef;
        }
        let vars: Vec<_> = objective
            .iter()
            .map(|&coef| problem.add_var(coef, (0.0, f64::INFINITY)))
            .collect();

        for row in &model.rows {
            let mut expr = LinearExpr::empty();
            for &(col, coef) in &row.coefficients {
                expr.add(vars[col], coef);
            }
            problem.add_constraint(expr, ComparisonOp::Le, row.rhs);
        }

        let solution = problem.solve().map_err(|e| EngineError::SolverFailure {
            reason: e.to_string(),
        })?;
        Ok(LpSolution {
            objective: solution.objective(),
            values: vars.iter().map(|&v| solution[v]).collect(),
        })
    }
}
