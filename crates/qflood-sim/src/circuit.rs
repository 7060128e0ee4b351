//! A flat gate-list circuit.

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::{QuantumError, QuantumResult};
use crate::gate::{Control, Gate};

/// One gate application.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub gate: Gate,
    pub targets: Vec<usize>,
    pub controls: Vec<Control>,
}

impl Instruction {
    pub fn inverse(&self) -> Self {
        Self {
            gate: self.gate.inverse(),
            targets: self.targets.clone(),
            controls: self.controls.clone(),
        }
    }
}

/// An ordered list of instructions over a fixed number of qubits.
///
/// Every instruction is validated when added: qubits are in range, targets
/// and controls are disjoint, and matrix sizes match the target count.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    name: String,
    num_qubits: usize,
    instructions: Vec<Instruction>,
}

impl Circuit {
    pub fn new(name: impl Into<String>, num_qubits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Append a gate with optional controls.
    pub fn push(
        &mut self,
        gate: Gate,
        targets: &[usize],
        controls: &[Control],
    ) -> QuantumResult<&mut Self> {
        if targets.is_empty() {
            return Err(QuantumError::InvalidCircuit(format!(
                "{} needs at least one target",
                gate.name()
            )));
        }
        if let Some(arity) = gate.arity() {
            if arity != targets.len() {
                return Err(QuantumError::InvalidCircuit(format!(
                    "{} acts on {arity} qubit(s), got {}",
                    gate.name(),
                    targets.len()
                )));
            }
        }
        if let Gate::Unitary(m) = &gate {
            if m.nrows() != m.ncols() || m.nrows() != 1 << targets.len() {
                return Err(QuantumError::InvalidCircuit(format!(
                    "unitary of shape {:?} cannot act on {} qubit(s)",
                    m.dim(),
                    targets.len()
                )));
            }
        }

        let mut seen = vec![false; self.num_qubits];
        for qubit in targets.iter().copied().chain(controls.iter().map(|c| c.qubit)) {
            if qubit >= self.num_qubits {
                return Err(QuantumError::InvalidCircuit(format!(
                    "qubit {qubit} out of range for {} qubits",
                    self.num_qubits
                )));
            }
            if seen[qubit] {
                return Err(QuantumError::InvalidCircuit(format!(
                    "qubit {qubit} used twice in one {} instruction",
                    gate.name()
                )));
            }
            seen[qubit] = true;
        }

        self.instructions.push(Instruction {
            gate,
            targets: targets.to_vec(),
            controls: controls.to_vec(),
        });
        Ok(self)
    }

    pub fn h(&mut self, qubit: usize) -> QuantumResult<&mut Self> {
        self.push(Gate::H, &[qubit], &[])
    }

    pub fn ry(&mut self, qubit: usize, theta: f64) -> QuantumResult<&mut Self> {
        self.push(Gate::Ry(theta), &[qubit], &[])
    }

    pub fn qft(&mut self, register: &[usize]) -> QuantumResult<&mut Self> {
        self.push(Gate::Qft, register, &[])
    }

    pub fn iqft(&mut self, register: &[usize]) -> QuantumResult<&mut Self> {
        self.push(Gate::InverseQft, register, &[])
    }

    pub fn unitary(
        &mut self,
        matrix: Array2<Complex64>,
        register: &[usize],
    ) -> QuantumResult<&mut Self> {
        self.push(Gate::Unitary(Arc::new(matrix)), register, &[])
    }

    pub fn controlled(
        &mut self,
        gate: Gate,
        targets: &[usize],
        controls: &[Control],
    ) -> QuantumResult<&mut Self> {
        self.push(gate, targets, controls)
    }

    /// Append all of `other`'s instructions.
    pub fn append(&mut self, other: &Circuit) -> QuantumResult<&mut Self> {
        if other.num_qubits > self.num_qubits {
            return Err(QuantumError::InvalidCircuit(format!(
                "cannot append a {}-qubit circuit to a {}-qubit circuit",
                other.num_qubits, self.num_qubits
            )));
        }
        self.instructions.extend(other.instructions.iter().cloned());
        Ok(self)
    }

    /// The adjoint circuit: reversed order, every gate inverted.
    pub fn inverse(&self) -> Self {
        Self {
            name: format!("{}_dg", self.name),
            num_qubits: self.num_qubits,
            instructions: self.instructions.iter().rev().map(Instruction::inverse).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn builder_chains() {
        let mut circuit = Circuit::new("bell", 2);
        circuit
            .h(0)
            .unwrap()
            .controlled(Gate::Ry(PI), &[1], &[Control::one(0)])
            .unwrap();
        assert_eq!(circuit.len(), 2);
        assert_eq!(circuit.instructions()[1].controls, vec![Control::one(0)]);
    }

    #[test]
    fn out_of_range_qubit_rejected() {
        let mut circuit = Circuit::new("c", 2);
        assert!(matches!(circuit.h(2), Err(QuantumError::InvalidCircuit(_))));
    }

    #[test]
    fn overlapping_control_rejected() {
        let mut circuit = Circuit::new("c", 2);
        assert!(circuit.controlled(Gate::H, &[1], &[Control::one(1)]).is_err());
    }

    #[test]
    fn unitary_size_checked() {
        let mut circuit = Circuit::new("c", 3);
        let m = Array2::<Complex64>::eye(4);
        assert!(circuit.unitary(m.clone(), &[0]).is_err());
        assert!(circuit.unitary(m, &[0, 2]).is_ok());
    }

    #[test]
    fn inverse_reverses_and_negates() {
        let mut circuit = Circuit::new("c", 2);
        circuit.ry(0, 0.3).unwrap().qft(&[0, 1]).unwrap();
        let inv = circuit.inverse();
        assert_eq!(inv.instructions()[0].gate, Gate::InverseQft);
        assert_eq!(inv.instructions()[1].gate, Gate::Ry(-0.3));
        assert_eq!(inv.name(), "c_dg");
    }

    #[test]
    fn append_checks_width() {
        let mut narrow = Circuit::new("narrow", 1);
        narrow.h(0).unwrap();
        let mut wide = Circuit::new("wide", 2);
        wide.append(&narrow).unwrap();
        assert_eq!(wide.len(), 1);
        assert!(narrow.append(&wide).is_err());
    }
}
