//! `qflood-linalg`: linear systems and the classical half of the solve
//! pipeline.
//!
//! - [`CsrMatrix`] / [`LinearSystem`]: the problem representation
//! - [`MatrixPreparer`]: reduces a system to the small Hermitian block the
//!   circuit simulator can encode
//! - [`ClassicalSolver`]: deterministic sparse LDLᵀ solves
//! - [`grid`]: five-point Laplacian assembly for flood grids
//! - [`artifact`]: lossless JSON encoding for arrays handed to a sink
//!
//! # Quick start
//!
//! ```rust
//! use ndarray::array;
//! use qflood_linalg::{ClassicalConfig, ClassicalSolver, CsrMatrix, LinearSystem};
//!
//! let a = CsrMatrix::from_dense(&array![[2.0, 0.0], [0.0, 2.0]]);
//! let system = LinearSystem::new(a, array![1.0, 1.0]).unwrap();
//!
//! let solver = ClassicalSolver::new(ClassicalConfig::default());
//! let solved = solver.solve_system(&system).unwrap();
//! assert!((solved.solution[0] - 0.5).abs() < 1e-12);
//! ```

pub mod artifact;
pub mod classical;
pub mod eigen;
pub mod error;
pub mod grid;
pub mod prepare;
pub mod sparse;
pub mod system;

pub use artifact::ArrayArtifact;
pub use classical::{
    ClassicalConfig, ClassicalMethod, ClassicalSolution, ClassicalSolver, FillOrdering,
};
pub use eigen::{SymmetricEigen, symmetric_eigen};
pub use error::{LinalgError, LinalgResult, PrepareError, PrepareResult, SolveError, SolveResult};
pub use grid::{FloodParameters, FloodSummary};
pub use prepare::{MatrixPreparer, PrepareConfig, PreparedSubsystem, SubmatrixStrategy};
pub use sparse::CsrMatrix;
pub use system::LinearSystem;
