//! Error types for the linalg crate.

use thiserror::Error;

/// Errors raised while building or decoding matrices and vectors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LinalgError {
    /// A value that must be finite was NaN or infinite.
    #[error("{what} contains a non-finite value at position {index}")]
    NonFinite {
        /// Which array was rejected.
        what: &'static str,
        /// Flat position of the offending entry.
        index: usize,
    },

    /// A triplet or lookup fell outside the matrix shape.
    #[error("entry ({row}, {col}) is outside a {nrows}x{ncols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },

    /// Two operands have incompatible lengths.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Compressed storage arrays are inconsistent.
    #[error("invalid CSR structure: {0}")]
    InvalidStructure(String),

    /// Grid parameters cannot produce a system.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Artifact decoded to the wrong array kind.
    #[error("expected a {expected} artifact, found {found}")]
    ArtifactKind {
        expected: &'static str,
        found: &'static str,
    },

    /// Artifact (de)serialization failed.
    #[error("artifact encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for matrix construction and encoding.
pub type LinalgResult<T> = Result<T, LinalgError>;

/// Errors produced by [`MatrixPreparer`](crate::MatrixPreparer).
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum PrepareError {
    /// The system is not square, `b` does not match, or it is smaller than
    /// the requested subsystem.
    #[error("matrix shape error: {0}")]
    MatrixShape(String),

    /// The selected block is asymmetric beyond the allowed tolerance.
    #[error("submatrix is not Hermitian: asymmetry {asymmetry:.3e} exceeds tolerance {tolerance:.3e}")]
    NonHermitian { asymmetry: f64, tolerance: f64 },

    /// The selected block is singular or too badly conditioned to invert.
    #[error("submatrix is ill-conditioned: condition number {condition_number:.3e} exceeds {threshold:.3e}")]
    IllConditioned { condition_number: f64, threshold: f64 },
}

/// Result type for subsystem preparation.
pub type PrepareResult<T> = Result<T, PrepareError>;

/// Errors produced by [`ClassicalSolver`](crate::ClassicalSolver).
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum SolveError {
    /// The system is not square or `b` has the wrong length.
    #[error("matrix shape error: {0}")]
    MatrixShape(String),

    /// The matrix is singular, or the solve did not reach the residual
    /// tolerance.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),
}

/// Result type for classical solves.
pub type SolveResult<T> = Result<T, SolveError>;
