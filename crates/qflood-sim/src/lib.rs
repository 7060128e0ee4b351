//! `qflood-sim`: statevector simulation of eigenvalue-inversion circuits.
//!
//! Takes a [`PreparedSubsystem`](qflood_linalg::PreparedSubsystem) from
//! `qflood-linalg`, builds an HHL-style circuit for it, evaluates the circuit
//! exactly, draws seeded shots to measure the ancilla success rate, and
//! decodes the post-selected branch back into a solution vector.
//!
//! # Quick start
//!
//! ```rust
//! use ndarray::array;
//! use qflood_linalg::{LinearSystem, MatrixPreparer, PrepareConfig};
//! use qflood_sim::{QuantumCircuitSolver, QuantumConfig};
//!
//! let system = LinearSystem::from_dense(&array![[2.0, 0.0], [0.0, 2.0]], array![1.0, 1.0]).unwrap();
//! let prepared = MatrixPreparer::new(PrepareConfig::default())
//!     .prepare_default(&system)
//!     .unwrap();
//!
//! let solved = QuantumCircuitSolver::new(QuantumConfig::default())
//!     .solve(&prepared, 42)
//!     .unwrap();
//! assert!((solved.solution[0] - 0.5).abs() < 1e-9);
//! ```

pub mod backend;
pub mod circuit;
pub mod error;
pub mod gate;
pub mod inversion;
pub mod sampler;
pub mod solver;
pub mod statevector;

pub use backend::{ExactBackend, StatevectorBackend};
pub use circuit::{Circuit, Instruction};
pub use error::{QuantumError, QuantumResult};
pub use gate::{Control, Gate};
pub use inversion::{InversionCircuit, RegisterLayout, build_inversion_circuit};
pub use sampler::{Counts, ShotSampler};
pub use solver::{DEFAULT_INVERSION_SCALE, QuantumCircuitSolver, QuantumConfig, QuantumSolution};
pub use statevector::Statevector;
