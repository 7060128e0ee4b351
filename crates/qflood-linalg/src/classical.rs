//! Deterministic classical solves of `A x = b`.
//!
//! Symmetric systems are factored with a sparse LDLᵀ. Non-symmetric systems,
//! and symmetric ones whose pivot-free factorisation hits a zero pivot, are
//! solved through the normal equations `Aᵀ A x = Aᵀ b`. Every result is checked
//! against the residual tolerance before it is returned.

use std::time::{Duration, Instant};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sprs::errors::LinalgError as SprsError;
use sprs::{FillInReduction, SymmetryCheck};
use sprs_ldl::Ldl;
use tracing::{debug, instrument, warn};

use crate::error::{SolveError, SolveResult};
use crate::sparse::CsrMatrix;
use crate::system::LinearSystem;

pub const DEFAULT_RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Fill-reducing permutation applied before factoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOrdering {
    #[default]
    ReverseCuthillMcKee,
    Natural,
}

impl FillOrdering {
    fn reduction(self) -> FillInReduction {
        match self {
            Self::ReverseCuthillMcKee => FillInReduction::ReverseCuthillMcKee,
            Self::Natural => FillInReduction::NoReduction,
        }
    }
}

impl std::str::FromStr for FillOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reverse_cuthill_mckee" | "rcm" => Ok(Self::ReverseCuthillMcKee),
            "natural" | "none" => Ok(Self::Natural),
            other => Err(format!("unknown fill ordering: {other}")),
        }
    }
}

/// Tunables for [`ClassicalSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalConfig {
    /// Largest accepted `||A x - b|| / max(||b||, 1)`.
    #[serde(default = "default_residual_tolerance")]
    pub residual_tolerance: f64,

    #[serde(default)]
    pub fill_ordering: FillOrdering,
}

fn default_residual_tolerance() -> f64 {
    DEFAULT_RESIDUAL_TOLERANCE
}

impl Default for ClassicalConfig {
    fn default() -> Self {
        Self {
            residual_tolerance: DEFAULT_RESIDUAL_TOLERANCE,
            fill_ordering: FillOrdering::default(),
        }
    }
}

impl ClassicalConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.residual_tolerance > 0.0 && self.residual_tolerance.is_finite()) {
            return Err("residual_tolerance must be a positive finite number".into());
        }
        Ok(())
    }
}

/// Which factorisation produced a [`ClassicalSolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassicalMethod {
    /// LDLᵀ of `A` itself.
    Ldl,
    /// LDLᵀ of `Aᵀ A`.
    NormalEquations,
}

/// Output of a successful classical solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicalSolution {
    pub solution: Array1<f64>,
    pub solve_time: Duration,
    /// `||A x - b|| / max(||b||, 1)`.
    pub residual: f64,
    pub method: ClassicalMethod,
}

/// Deterministic solver for the full system.
#[derive(Debug, Clone, Default)]
pub struct ClassicalSolver {
    config: ClassicalConfig,
}

impl ClassicalSolver {
    pub fn new(config: ClassicalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassicalConfig {
        &self.config
    }

    pub fn solve_system(&self, system: &LinearSystem) -> SolveResult<ClassicalSolution> {
        self.solve(system.a(), system.b())
    }

    /// Solve a sparse system.
    #[instrument(skip_all, fields(n = a.nrows(), nnz = a.nnz()))]
    pub fn solve(&self, a: &CsrMatrix, b: &Array1<f64>) -> SolveResult<ClassicalSolution> {
        let start = Instant::now();
        check_shape(a.nrows(), a.ncols(), b.len())?;

        if a.is_symmetric(0.0) {
            match self.factor_and_solve(a, b.to_vec()) {
                Ok(x) => {
                    let residual = residual_of(a, &x, b)?;
                    return self.finish(x, residual, ClassicalMethod::Ldl, start);
                }
                Err(e) => warn!(error = %e, "LDL factorisation failed, using normal equations"),
            }
        }

        let gram = a.gram();
        let atb = a
            .transpose()
            .matvec(&b.view())
            .map_err(|e| SolveError::MatrixShape(e.to_string()))?;
        let x = self.factor_and_solve(&gram, atb.to_vec())?;
        let residual = residual_of(a, &x, b)?;
        self.finish(x, residual, ClassicalMethod::NormalEquations, start)
    }

    /// Solve a small dense system.
    pub fn solve_dense(&self, a: &Array2<f64>, b: &Array1<f64>) -> SolveResult<ClassicalSolution> {
        check_shape(a.nrows(), a.ncols(), b.len())?;
        self.solve(&CsrMatrix::from_dense(a), b)
    }

    /// Factor a symmetric matrix and solve one right-hand side.
    fn factor_and_solve(&self, a: &CsrMatrix, rhs: Vec<f64>) -> SolveResult<Array1<f64>> {
        let ldl = Ldl::new()
            .fill_in_reduction(self.config.fill_ordering.reduction())
            .check_symmetry(SymmetryCheck::DontCheckSymmetry)
            .numeric(a.as_sprs().view())
            .map_err(singular)?;
        let x = Array1::from_vec(ldl.solve(rhs.as_slice()));
        if let Some(index) = x.iter().position(|v| !v.is_finite()) {
            return Err(SolveError::SingularMatrix(format!(
                "non-finite solution entry at index {index}"
            )));
        }
        Ok(x)
    }

    fn finish(
        &self,
        solution: Array1<f64>,
        residual: f64,
        method: ClassicalMethod,
        start: Instant,
    ) -> SolveResult<ClassicalSolution> {
        if !(residual <= self.config.residual_tolerance) {
            return Err(SolveError::SingularMatrix(format!(
                "relative residual {residual:.3e} exceeds tolerance {:.3e}",
                self.config.residual_tolerance
            )));
        }
        let solve_time = start.elapsed();
        debug!(?method, residual, ?solve_time, "classical solve finished");
        Ok(ClassicalSolution {
            solution,
            solve_time,
            residual,
            method,
        })
    }
}

fn singular(e: SprsError) -> SolveError {
    match e {
        SprsError::SingularMatrix(info) => SolveError::SingularMatrix(format!(
            "zero pivot at index {}: {}",
            info.index, info.reason
        )),
        other => SolveError::SingularMatrix(other.to_string()),
    }
}

fn check_shape(rows: usize, cols: usize, rhs: usize) -> SolveResult<()> {
    if rows != cols {
        return Err(SolveError::MatrixShape(format!(
            "matrix must be square, got {rows}x{cols}"
        )));
    }
    if rhs != rows {
        return Err(SolveError::MatrixShape(format!(
            "right-hand side has length {rhs}, matrix has {rows} rows"
        )));
    }
    if rows == 0 {
        return Err(SolveError::MatrixShape("system is empty".into()));
    }
    Ok(())
}

fn residual_of(a: &CsrMatrix, x: &Array1<f64>, b: &Array1<f64>) -> SolveResult<f64> {
    let ax = a
        .matvec(&x.view())
        .map_err(|e| SolveError::MatrixShape(e.to_string()))?;
    let r = &ax - b;
    Ok(r.dot(&r).sqrt() / b.dot(b).sqrt().max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::laplacian_2d;
    use ndarray::array;

    fn solver() -> ClassicalSolver {
        ClassicalSolver::new(ClassicalConfig::default())
    }

    #[test]
    fn diagonal_system() {
        let a = CsrMatrix::from_diagonal(&[2.0, 2.0]);
        let solved = solver().solve(&a, &array![1.0, 1.0]).unwrap();
        assert_eq!(solved.solution, array![0.5, 0.5]);
        assert_eq!(solved.method, ClassicalMethod::Ldl);
    }

    #[test]
    fn zero_pivot_uses_normal_equations() {
        let a = CsrMatrix::from_dense(&array![[0.0, 1.0], [1.0, 0.0]]);
        let solved = solver().solve(&a, &array![3.0, 4.0]).unwrap();
        assert_eq!(solved.solution, array![4.0, 3.0]);
        assert_eq!(solved.method, ClassicalMethod::NormalEquations);
    }

    #[test]
    fn non_symmetric_system_uses_normal_equations() {
        let a = CsrMatrix::from_dense(&array![[2.0, 1.0], [0.0, 1.0]]);
        let solved = solver().solve(&a, &array![3.0, 1.0]).unwrap();
        assert_eq!(solved.method, ClassicalMethod::NormalEquations);
        assert!((solved.solution[0] - 1.0).abs() < 1e-12);
        assert!((solved.solution[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_rejected() {
        let a = CsrMatrix::from_dense(&array![[1.0, 2.0], [2.0, 4.0]]);
        let err = solver().solve(&a, &array![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, SolveError::SingularMatrix(_)));
    }

    #[test]
    fn zero_matrix_rejected() {
        let a = CsrMatrix::from_diagonal(&[0.0, 0.0]);
        assert!(matches!(
            solver().solve(&a, &array![1.0, 0.0]),
            Err(SolveError::SingularMatrix(_))
        ));
    }

    #[test]
    fn shape_mismatch_rejected() {
        let a = CsrMatrix::from_diagonal(&[1.0, 1.0, 1.0]);
        assert!(matches!(
            solver().solve(&a, &array![1.0, 1.0]),
            Err(SolveError::MatrixShape(_))
        ));
    }

    #[test]
    fn grid_laplacian_factored_directly() {
        let a = laplacian_2d(20).unwrap();
        let b = Array1::from_elem(400, 0.1);
        let solved = solver().solve(&a, &b).unwrap();
        assert_eq!(solved.method, ClassicalMethod::Ldl);

        let ax = a.matvec(&solved.solution.view()).unwrap();
        let r = &ax - &b;
        assert!(r.dot(&r).sqrt() < 1e-8);
    }

    #[test]
    fn fill_orderings_agree() {
        let a = laplacian_2d(9).unwrap();
        let b = Array1::from_iter((0..81).map(|i| (i % 7) as f64 * 0.25));
        let rcm = solver().solve(&a, &b).unwrap();
        let natural = ClassicalSolver::new(ClassicalConfig {
            fill_ordering: FillOrdering::Natural,
            ..ClassicalConfig::default()
        })
        .solve(&a, &b)
        .unwrap();
        for (x, y) in rcm.solution.iter().zip(natural.solution.iter()) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    #[test]
    fn tolerance_gates_result() {
        let a = CsrMatrix::from_dense(&array![[1.0, 1.0], [1.0, 1.0 + 1e-12]]);
        let strict = ClassicalSolver::new(ClassicalConfig {
            residual_tolerance: 1e-30,
            ..ClassicalConfig::default()
        });
        assert!(matches!(
            strict.solve(&a, &array![1.0, 3.0]),
            Err(SolveError::SingularMatrix(_))
        ));
    }

    #[test]
    fn dense_entry_point_matches_sparse() {
        let dense = array![[4.0, -1.0], [-1.0, 4.0]];
        let b = array![1.0, 2.0];
        let from_dense = solver().solve_dense(&dense, &b).unwrap();
        let from_sparse = solver().solve(&CsrMatrix::from_dense(&dense), &b).unwrap();
        assert_eq!(from_dense.solution, from_sparse.solution);
    }

    #[test]
    fn repeated_solves_are_identical() {
        let a = laplacian_2d(6).unwrap();
        let b = Array1::from_elem(36, 0.1);
        let first = solver().solve(&a, &b).unwrap();
        let second = solver().solve(&a, &b).unwrap();
        assert_eq!(first.solution, second.solution);
    }
}
