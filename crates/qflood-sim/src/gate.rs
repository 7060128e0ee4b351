//! Gates understood by the statevector simulator.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array2, arr2};
use num_complex::Complex64;

/// A gate acting on an ordered list of target qubits. Target `t` is bit `t`
/// of the register value the gate's matrix is indexed by.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    H,
    Ry(f64),
    /// Quantum Fourier transform over the whole target register.
    Qft,
    InverseQft,
    /// Arbitrary unitary over the target register.
    Unitary(Arc<Array2<Complex64>>),
}

impl Gate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::H => "h",
            Self::Ry(_) => "ry",
            Self::Qft => "qft",
            Self::InverseQft => "iqft",
            Self::Unitary(_) => "unitary",
        }
    }

    /// Number of targets the gate requires, `None` for register-sized gates.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::H | Self::Ry(_) => Some(1),
            Self::Qft | Self::InverseQft => None,
            Self::Unitary(m) => Some(m.nrows().trailing_zeros() as usize),
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            Self::H => Self::H,
            Self::Ry(theta) => Self::Ry(-theta),
            Self::Qft => Self::InverseQft,
            Self::InverseQft => Self::Qft,
            Self::Unitary(m) => Self::Unitary(Arc::new(m.t().mapv(|z| z.conj()))),
        }
    }

    /// Dense matrix over `num_targets` qubits.
    pub fn matrix(&self, num_targets: usize) -> Array2<Complex64> {
        match self {
            Self::H => {
                let s = Complex64::new(1.0 / 2.0_f64.sqrt(), 0.0);
                arr2(&[[s, s], [s, -s]])
            }
            Self::Ry(theta) => {
                let c = Complex64::new((theta / 2.0).cos(), 0.0);
                let s = Complex64::new((theta / 2.0).sin(), 0.0);
                arr2(&[[c, -s], [s, c]])
            }
            Self::Qft => fourier_matrix(num_targets, 1.0),
            Self::InverseQft => fourier_matrix(num_targets, -1.0),
            Self::Unitary(m) => m.as_ref().clone(),
        }
    }
}

/// `F[y][x] = e^{sign * 2πi xy / N} / √N`.
fn fourier_matrix(num_targets: usize, sign: f64) -> Array2<Complex64> {
    let dim = 1usize << num_targets;
    let norm = 1.0 / (dim as f64).sqrt();
    Array2::from_shape_fn((dim, dim), |(y, x)| {
        let angle = sign * 2.0 * PI * ((x * y) % dim) as f64 / dim as f64;
        Complex64::from_polar(norm, angle)
    })
}

/// A control condition: the gate only acts where `qubit` reads `on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Control {
    pub qubit: usize,
    pub on: bool,
}

impl Control {
    /// Control on `|1⟩`.
    pub fn one(qubit: usize) -> Self {
        Self { qubit, on: true }
    }

    /// Control on `|0⟩`.
    pub fn zero(qubit: usize) -> Self {
        Self { qubit, on: false }
    }

    /// Controls that fire when `register` holds `value` (little-endian).
    pub fn register_equals(register: &[usize], value: usize) -> Vec<Self> {
        register
            .iter()
            .enumerate()
            .map(|(bit, &qubit)| Self {
                qubit,
                on: (value >> bit) & 1 == 1,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unitary(m: &Array2<Complex64>) -> bool {
        let product = m.t().mapv(|z| z.conj()).dot(m);
        product.indexed_iter().all(|((i, j), z)| {
            let want = if i == j { 1.0 } else { 0.0 };
            (z.re - want).abs() < 1e-12 && z.im.abs() < 1e-12
        })
    }

    #[test]
    fn fourier_matrices_are_unitary_inverses() {
        for n in 1..=3 {
            let f = Gate::Qft.matrix(n);
            let g = Gate::InverseQft.matrix(n);
            assert!(is_unitary(&f));
            let product = g.dot(&f);
            for ((i, j), z) in product.indexed_iter() {
                let want = if i == j { 1.0 } else { 0.0 };
                assert!((z.re - want).abs() < 1e-12 && z.im.abs() < 1e-12);
            }
        }
    }

    #[test]
    fn inverse_of_ry_undoes_rotation() {
        let g = Gate::Ry(0.7);
        let product = g.inverse().matrix(1).dot(&g.matrix(1));
        assert!((product[[0, 0]].re - 1.0).abs() < 1e-12);
        assert!(product[[1, 0]].norm() < 1e-12);
    }

    #[test]
    fn unitary_arity_from_dimension() {
        let m = Arc::new(Array2::<Complex64>::eye(4));
        assert_eq!(Gate::Unitary(m).arity(), Some(2));
        assert_eq!(Gate::Qft.arity(), None);
    }

    #[test]
    fn register_controls_are_little_endian() {
        let controls = Control::register_equals(&[5, 6], 2);
        assert_eq!(controls, vec![Control::zero(5), Control::one(6)]);
    }
}
