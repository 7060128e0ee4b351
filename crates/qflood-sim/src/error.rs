//! Error types for the sim crate.

use thiserror::Error;

/// Errors produced while building or simulating an inversion circuit.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum QuantumError {
    /// Too few shots landed in the ancilla success branch.
    #[error(
        "ancilla success rate {rate:.4} is below the minimum {minimum:.4} ({successes}/{shots} shots)"
    )]
    LowSuccessRate {
        rate: f64,
        minimum: f64,
        successes: u32,
        shots: u32,
    },

    /// The backend could not produce amplitudes for the circuit.
    #[error("statevector unavailable: {0}")]
    StatevectorUnavailable(String),

    /// A gate was added with bad qubits or a malformed matrix.
    #[error("invalid circuit: {0}")]
    InvalidCircuit(String),
}

/// Result type for circuit construction and simulation.
pub type QuantumResult<T> = Result<T, QuantumError>;
