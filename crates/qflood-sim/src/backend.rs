//! Statevector backends.

use tracing::{debug, instrument};

use crate::circuit::Circuit;
use crate::error::{QuantumError, QuantumResult};
use crate::statevector::Statevector;

pub const DEFAULT_MAX_QUBITS: usize = 16;

/// Tolerance on `| ||ψ||² - 1 |` after simulation.
const NORM_TOLERANCE: f64 = 1e-9;

/// Something that can turn a circuit into final-state amplitudes.
pub trait StatevectorBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run `circuit` from `|0...0⟩` and return the final state.
    fn run(&self, circuit: &Circuit) -> QuantumResult<Statevector>;
}

/// Exact dense simulation in memory.
#[derive(Debug, Clone)]
pub struct ExactBackend {
    max_qubits: usize,
}

impl ExactBackend {
    pub fn new(max_qubits: usize) -> Self {
        Self { max_qubits }
    }

    pub fn max_qubits(&self) -> usize {
        self.max_qubits
    }
}

impl Default for ExactBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUBITS)
    }
}

impl StatevectorBackend for ExactBackend {
    fn name(&self) -> &str {
        "exact"
    }

    #[instrument(skip(self, circuit), fields(circuit = circuit.name(), qubits = circuit.num_qubits()))]
    fn run(&self, circuit: &Circuit) -> QuantumResult<Statevector> {
        if circuit.num_qubits() > self.max_qubits {
            return Err(QuantumError::StatevectorUnavailable(format!(
                "circuit needs {} qubits, backend allows {}",
                circuit.num_qubits(),
                self.max_qubits
            )));
        }

        let mut state = Statevector::new(circuit.num_qubits());
        for instruction in circuit.instructions() {
            state.apply(instruction);
        }

        let norm = state.norm_sqr();
        if !((norm - 1.0).abs() <= NORM_TOLERANCE) {
            return Err(QuantumError::StatevectorUnavailable(format!(
                "final state has norm² {norm}, circuit is not unitary"
            )));
        }
        debug!(gates = circuit.len(), "statevector evaluated");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use num_complex::Complex64;

    #[test]
    fn rejects_oversized_circuits() {
        let backend = ExactBackend::new(2);
        let circuit = Circuit::new("wide", 3);
        assert!(matches!(
            backend.run(&circuit),
            Err(QuantumError::StatevectorUnavailable(_))
        ));
    }

    #[test]
    fn rejects_non_unitary_matrix() {
        let mut circuit = Circuit::new("leaky", 1);
        let half = Array2::from_elem((2, 2), Complex64::new(0.5, 0.0));
        circuit.unitary(half, &[0]).unwrap();
        assert!(matches!(
            ExactBackend::default().run(&circuit),
            Err(QuantumError::StatevectorUnavailable(_))
        ));
    }

    #[test]
    fn runs_small_circuit() {
        let mut circuit = Circuit::new("h", 1);
        circuit.h(0).unwrap();
        let sv = ExactBackend::default().run(&circuit).unwrap();
        assert!((sv.probabilities()[1] - 0.5).abs() < 1e-12);
    }
}
