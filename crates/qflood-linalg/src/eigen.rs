//! Cyclic Jacobi eigendecomposition for small dense symmetric matrices.

use ndarray::{Array1, Array2};

const MAX_SWEEPS: usize = 64;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-15;

/// Eigenpairs of a real symmetric matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricEigen {
    /// Eigenvalues in ascending order.
    pub values: Array1<f64>,
    /// Orthonormal eigenvectors, column `j` pairs with `values[j]`.
    pub vectors: Array2<f64>,
}

impl SymmetricEigen {
    /// Largest absolute eigenvalue.
    pub fn spectral_radius(&self) -> f64 {
        self.values.iter().fold(0.0f64, |m, v| m.max(v.abs()))
    }

    /// Smallest absolute eigenvalue.
    pub fn min_abs(&self) -> f64 {
        self.values.iter().fold(f64::INFINITY, |m, v| m.min(v.abs()))
    }

    /// `max|λ| / min|λ|`, infinite for a singular matrix.
    pub fn condition_number(&self) -> f64 {
        let min_abs = self.min_abs();
        if min_abs == 0.0 {
            f64::INFINITY
        } else {
            self.spectral_radius() / min_abs
        }
    }
}

/// Diagonalize a symmetric matrix. Only the upper triangle's symmetry is
/// assumed; callers symmetrize first. The result is fully deterministic.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> SymmetricEigen {
    let n = matrix.nrows();
    let mut m = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    let scale = m.iter().map(|x| x * x).sum::<f64>().sqrt();
    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| m[[p, q]] * m[[p, q]])
            .sum::<f64>()
            .sqrt();
        if off <= OFF_DIAGONAL_TOLERANCE * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (mkp, mkq) = (m[[k, p]], m[[k, q]]);
                    m[[k, p]] = c * mkp - s * mkq;
                    m[[k, q]] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let (mpk, mqk) = (m[[p, k]], m[[q, k]]);
                    m[[p, k]] = c * mpk - s * mqk;
                    m[[q, k]] = s * mpk + c * mqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| m[[i, i]].total_cmp(&m[[j, j]]).then(i.cmp(&j)));

    let values = Array1::from_iter(order.iter().map(|&i| m[[i, i]]));
    let mut vectors = Array2::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        vectors.column_mut(dst).assign(&v.column(src));
    }

    SymmetricEigen { values, vectors }
}
