//! The `A x = b` problem handed to the solve pipeline.

use ndarray::{Array1, Array2};

use crate::error::{LinalgError, LinalgResult};
use crate::grid::{self, FloodParameters};
use crate::sparse::CsrMatrix;

/// A sparse matrix and right-hand side.
///
/// Every stored value is finite. Shape compatibility is checked by the
/// solvers, which report it as a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    a: CsrMatrix,
    b: Array1<f64>,
}

impl LinearSystem {
    pub fn new(a: CsrMatrix, b: Array1<f64>) -> LinalgResult<Self> {
        if let Some(index) = b.iter().position(|v| !v.is_finite()) {
            return Err(LinalgError::NonFinite {
                what: "right-hand side",
                index,
            });
        }
        if let Some(index) = a.data().iter().position(|v| !v.is_finite()) {
            return Err(LinalgError::NonFinite {
                what: "matrix",
                index,
            });
        }
        Ok(Self { a, b })
    }

    pub fn from_dense(a: &Array2<f64>, b: Array1<f64>) -> LinalgResult<Self> {
        Self::new(CsrMatrix::from_dense(a), b)
    }

    /// Five-point Laplacian flood system for the given grid.
    pub fn from_grid(params: &FloodParameters) -> LinalgResult<Self> {
        params.validate()?;
        let a = grid::laplacian_2d(params.grid_resolution)?;
        let b = grid::uniform_source(a.nrows(), params.source_value);
        Self::new(a, b)
    }

    pub fn a(&self) -> &CsrMatrix {
        &self.a
    }

    pub fn b(&self) -> &Array1<f64> {
        &self.b
    }

    /// Number of unknowns (rows of `A`).
    pub fn dim(&self) -> usize {
        self.a.nrows()
    }

    /// True when `A` is square and `b` matches it.
    pub fn is_well_formed(&self) -> bool {
        self.a.is_square() && self.b.len() == self.a.nrows()
    }

    /// Describe a shape problem, if any.
    pub fn shape_problem(&self) -> Option<String> {
        let (rows, cols) = self.a.shape();
        if rows != cols {
            Some(format!("matrix must be square, got {rows}x{cols}"))
        } else if self.b.len() != rows {
            Some(format!(
                "right-hand side has length {}, matrix has {rows} rows",
                self.b.len()
            ))
        } else if rows == 0 {
            Some("system is empty".to_string())
        } else {
            None
        }
    }
}
