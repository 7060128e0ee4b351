//! Eigenvalue-inversion (HHL) circuit construction.
//!
//! Register layout, little-endian within each register:
//!
//! ```text
//! qubit 0                 ancilla
//! qubits 1 ..= m          eigenvalue register (m = eval_qubits)
//! qubits m+1 ..           state register (log2 k qubits)
//! ```
//!
//! The block's eigenvalues are estimated classically ahead of time, so the
//! phase register encodes each eigenvector's *rank*: the `j`-th smallest
//! eigenvalue gets phase `j / 2^m`. Phase estimation is then exact as long
//! as `k <= 2^m`, and the controlled ancilla rotation for bucket `j` uses
//! `C / λ_j` directly, with `C = inversion_scale * min|λ|`.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use qflood_linalg::PreparedSubsystem;

use crate::circuit::Circuit;
use crate::error::{QuantumError, QuantumResult};
use crate::gate::{Control, Gate};

/// Where each register lives in the full qubit index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterLayout {
    pub ancilla: usize,
    pub eval: Vec<usize>,
    pub state: Vec<usize>,
}

impl RegisterLayout {
    pub fn new(eval_qubits: usize, state_qubits: usize) -> Self {
        Self {
            ancilla: 0,
            eval: (1..=eval_qubits).collect(),
            state: (eval_qubits + 1..=eval_qubits + state_qubits).collect(),
        }
    }

    pub fn num_qubits(&self) -> usize {
        1 + self.eval.len() + self.state.len()
    }

    pub fn ancilla_set(&self, index: usize) -> bool {
        (index >> self.ancilla) & 1 == 1
    }

    pub fn eval_value(&self, index: usize) -> usize {
        (index >> self.eval.first().copied().unwrap_or(1)) & ((1 << self.eval.len()) - 1)
    }

    pub fn state_value(&self, index: usize) -> usize {
        (index >> (1 + self.eval.len())) & ((1 << self.state.len()) - 1)
    }

    /// Basis index of `ancilla = 1, eval = 0, state = value`.
    pub fn success_index(&self, state_value: usize) -> usize {
        (1 << self.ancilla) | (state_value << (1 + self.eval.len()))
    }
}

/// A built inversion circuit plus what is needed to decode its output.
#[derive(Debug, Clone)]
pub struct InversionCircuit {
    pub circuit: Circuit,
    pub layout: RegisterLayout,
    /// `C = inversion_scale * min|λ̃|`; the success amplitude of
    /// eigencomponent `j` is `C / λ̃_j`.
    pub inversion_constant: f64,
    /// Scaled eigenvalues after clamping, ascending by rank.
    pub eigenvalues: Vec<f64>,
}

/// Build the full prepare → estimate → rotate → uncompute circuit for a
/// prepared block.
pub fn build_inversion_circuit(
    prepared: &PreparedSubsystem,
    eval_qubits: usize,
    eigenvalue_clamp: f64,
    inversion_scale: f64,
) -> QuantumResult<InversionCircuit> {
    let k = prepared.dim();
    if !k.is_power_of_two() || k < 2 {
        return Err(QuantumError::StatevectorUnavailable(format!(
            "subsystem dimension {k} is not a power of two"
        )));
    }
    if eval_qubits == 0 || eval_qubits >= usize::BITS as usize || k > 1 << eval_qubits {
        return Err(QuantumError::StatevectorUnavailable(format!(
            "{eval_qubits} eigenvalue qubits cannot resolve {k} eigenvalues"
        )));
    }
    if !(inversion_scale > 0.0 && inversion_scale <= 1.0) {
        return Err(QuantumError::StatevectorUnavailable(format!(
            "inversion scale {inversion_scale} is outside (0, 1]"
        )));
    }
    let state_qubits = k.trailing_zeros() as usize;
    let layout = RegisterLayout::new(eval_qubits, state_qubits);

    let eigen = prepared.eigen();
    let eigenvalues: Vec<f64> = eigen
        .values
        .iter()
        .map(|&lambda| clamp_eigenvalue(lambda, eigenvalue_clamp))
        .collect();
    let inversion_constant = inversion_scale
        * eigenvalues
            .iter()
            .fold(f64::INFINITY, |m, lambda| m.min(lambda.abs()));

    let mut circuit = Circuit::new("eigenvalue_inversion", layout.num_qubits());
    encode_rhs(&mut circuit, prepared.b_sub(), &layout.state)?;

    let estimation = phase_estimation(&eigen.vectors, &layout)?;
    circuit.append(&estimation)?;

    for (rank, &lambda) in eigenvalues.iter().enumerate() {
        let ratio = (inversion_constant / lambda).clamp(-1.0, 1.0);
        let theta = 2.0 * ratio.asin();
        let controls = Control::register_equals(&layout.eval, rank);
        circuit.controlled(Gate::Ry(theta), &[layout.ancilla], &controls)?;
    }

    circuit.append(&estimation.inverse())?;

    Ok(InversionCircuit {
        circuit,
        layout,
        inversion_constant,
        eigenvalues,
    })
}

/// Move eigenvalues with `|λ| < clamp` out to `±clamp`, keeping the sign
/// (zero goes positive).
pub fn clamp_eigenvalue(lambda: f64, clamp: f64) -> f64 {
    if lambda.abs() >= clamp {
        lambda
    } else if lambda < 0.0 {
        -clamp
    } else {
        clamp
    }
}

/// Load the unit vector `b` into the state register from `|0⟩`.
fn encode_rhs(circuit: &mut Circuit, b: &Array1<f64>, state: &[usize]) -> QuantumResult<()> {
    if state.len() == 1 {
        circuit.ry(state[0], 2.0 * b[1].atan2(b[0]))?;
        return Ok(());
    }
    circuit.unitary(householder_loader(b), state)?;
    Ok(())
}

/// Real orthogonal matrix whose first column is `b` (a unit vector).
fn householder_loader(b: &Array1<f64>) -> Array2<Complex64> {
    let k = b.len();
    let mut v = -b.clone();
    v[0] += 1.0;
    let vv = v.dot(&v);
    let reflection = if vv < 1e-30 {
        Array2::<f64>::eye(k)
    } else {
        let outer = Array2::from_shape_fn((k, k), |(i, j)| v[i] * v[j]);
        Array2::<f64>::eye(k) - outer * (2.0 / vv)
    };
    reflection.mapv(|x| Complex64::new(x, 0.0))
}

/// Hadamards on the eigenvalue register, controlled `U^(2^j)` where
/// `U = V diag(e^{2πi·rank/2^m}) Vᵀ`, then the inverse QFT.
fn phase_estimation(vectors: &Array2<f64>, layout: &RegisterLayout) -> QuantumResult<Circuit> {
    let m = layout.eval.len();
    let buckets = 1usize << m;
    let k = vectors.ncols();
    let v = vectors.mapv(|x| Complex64::new(x, 0.0));
    let vt = v.t().to_owned();

    let mut circuit = Circuit::new("phase_estimation", layout.num_qubits());
    for &qubit in &layout.eval {
        circuit.h(qubit)?;
    }
    for (j, &control) in layout.eval.iter().enumerate() {
        let power = 1usize << j;
        let phases = Array1::from_iter((0..k).map(|rank| {
            let turns = ((rank * power) % buckets) as f64 / buckets as f64;
            Complex64::from_polar(1.0, 2.0 * PI * turns)
        }));
        let u = v.dot(&Array2::from_diag(&phases)).dot(&vt);
        circuit.controlled(
            Gate::Unitary(Arc::new(u)),
            &layout.state,
            &[Control::one(control)],
        )?;
    }
    circuit.iqft(&layout.eval)?;
    Ok(circuit)
}
