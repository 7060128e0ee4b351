//! Statevector simulation engine.
//!
//! Qubit `q` is bit `q` of the basis-state index.

use ndarray::Array2;
use num_complex::Complex64;

use crate::circuit::Instruction;
use crate::gate::{Control, Gate};

/// Basis states matching a set of control conditions: `index & mask == value`.
#[derive(Debug, Clone, Copy, Default)]
struct ControlMask {
    mask: usize,
    value: usize,
}

impl ControlMask {
    fn new(controls: &[Control]) -> Self {
        controls.iter().fold(Self::default(), |acc, c| Self {
            mask: acc.mask | 1 << c.qubit,
            value: if c.on { acc.value | 1 << c.qubit } else { acc.value },
        })
    }

    #[inline]
    fn fires(&self, index: usize) -> bool {
        index & self.mask == self.value
    }
}

/// A pure state of `num_qubits` qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    pub fn amplitude(&self, index: usize) -> Complex64 {
        self.amplitudes[index]
    }

    /// `|ψ_i|²` for every basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    /// `Σ |ψ_i|²`.
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }

    /// Apply an instruction. The circuit builder has already validated the
    /// qubit indices.
    pub fn apply(&mut self, instruction: &Instruction) {
        let ctrl = ControlMask::new(&instruction.controls);
        let targets = &instruction.targets;
        match &instruction.gate {
            Gate::H => self.apply_h(targets[0], ctrl),
            Gate::Ry(theta) => self.apply_ry(targets[0], *theta, ctrl),
            gate @ (Gate::Qft | Gate::InverseQft) => {
                let matrix = gate.matrix(targets.len());
                self.apply_matrix(&matrix, targets, ctrl);
            }
            Gate::Unitary(matrix) => self.apply_matrix(matrix, targets, ctrl),
        }
    }

    // =========================================================================
    // Single-qubit gate implementations
    // =========================================================================

    fn apply_h(&mut self, qubit: usize, ctrl: ControlMask) {
        let mask = 1 << qubit;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 && ctrl.fires(i) {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64, ctrl: ControlMask) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 && ctrl.fires(i) {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    // =========================================================================
    // Register gate implementation
    // =========================================================================

    /// Dense matrix on an arbitrary target register. Register value `v` has
    /// bit `t` set when `targets[t]` is `|1⟩`.
    fn apply_matrix(&mut self, matrix: &Array2<Complex64>, targets: &[usize], ctrl: ControlMask) {
        let dim = 1usize << targets.len();
        let target_mask = targets.iter().fold(0usize, |m, &q| m | 1 << q);
        let offsets: Vec<usize> = (0..dim)
            .map(|v| {
                targets
                    .iter()
                    .enumerate()
                    .filter(|&(bit, _)| (v >> bit) & 1 == 1)
                    .fold(0usize, |acc, (_, &q)| acc | 1 << q)
            })
            .collect();

        let mut local = vec![Complex64::new(0.0, 0.0); dim];
        for base in 0..(1 << self.num_qubits) {
            if base & target_mask != 0 || !ctrl.fires(base) {
                continue;
            }
            for (slot, &offset) in local.iter_mut().zip(&offsets) {
                *slot = self.amplitudes[base | offset];
            }
            for (row, &offset) in offsets.iter().enumerate() {
                self.amplitudes[base | offset] = local
                    .iter()
                    .enumerate()
                    .map(|(col, amp)| matrix[[row, col]] * amp)
                    .sum();
            }
        }
    }
}
