//! Reduction of a full system to the small Hermitian block encoded by the
//! circuit simulator.
//!
//! The preparer never mutates its input. For a given system, strategy and
//! configuration the output is identical across calls.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::eigen::{SymmetricEigen, symmetric_eigen};
use crate::error::{PrepareError, PrepareResult};
use crate::system::LinearSystem;

pub const DEFAULT_SUBSYSTEM_DIM: usize = 2;
pub const DEFAULT_HERMITIAN_TOLERANCE: f64 = 1e-8;
pub const DEFAULT_CONDITION_THRESHOLD: f64 = 1e10;

/// Below this 2-norm the restricted right-hand side is treated as zero.
const MIN_RHS_NORM: f64 = 1e-300;

/// Which `k` indices of the full system form the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmatrixStrategy {
    /// Indices `0..k`.
    #[default]
    LeadingBlock,
    /// The `k` rows with the largest `|a_ii|`; ties go to the lower index.
    /// Returned in ascending index order.
    DominantDiagonal,
}

impl SubmatrixStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LeadingBlock => "leading_block",
            Self::DominantDiagonal => "dominant_diagonal",
        }
    }

    fn select(self, system: &LinearSystem, k: usize) -> Vec<usize> {
        match self {
            Self::LeadingBlock => (0..k).collect(),
            Self::DominantDiagonal => {
                let diagonal = system.a().diagonal();
                let mut order: Vec<usize> = (0..diagonal.len()).collect();
                order.sort_by(|&i, &j| {
                    diagonal[j]
                        .abs()
                        .total_cmp(&diagonal[i].abs())
                        .then(i.cmp(&j))
                });
                let mut chosen: Vec<usize> = order.into_iter().take(k).collect();
                chosen.sort_unstable();
                chosen
            }
        }
    }
}

impl fmt::Display for SubmatrixStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SubmatrixStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "leading_block" | "leading" => Ok(Self::LeadingBlock),
            "dominant_diagonal" | "dominant" => Ok(Self::DominantDiagonal),
            other => Err(format!(
                "unknown submatrix strategy '{other}', expected leading_block or dominant_diagonal"
            )),
        }
    }
}

/// Tunables for [`MatrixPreparer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Subsystem dimension `k`, either 2 or 4.
    #[serde(default = "default_subsystem_dim")]
    pub subsystem_dim: usize,

    /// Default strategy used when the caller does not pick one.
    #[serde(default)]
    pub strategy: SubmatrixStrategy,

    /// Allowed `max|a_ij - a_ji|`, relative to `max(1, max|a_ij|)`.
    #[serde(default = "default_hermitian_tolerance")]
    pub hermitian_tolerance: f64,

    /// Largest accepted `max|λ| / min|λ|`.
    #[serde(default = "default_condition_threshold")]
    pub condition_threshold: f64,
}

fn default_subsystem_dim() -> usize {
    DEFAULT_SUBSYSTEM_DIM
}

fn default_hermitian_tolerance() -> f64 {
    DEFAULT_HERMITIAN_TOLERANCE
}

fn default_condition_threshold() -> f64 {
    DEFAULT_CONDITION_THRESHOLD
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            subsystem_dim: DEFAULT_SUBSYSTEM_DIM,
            strategy: SubmatrixStrategy::default(),
            hermitian_tolerance: DEFAULT_HERMITIAN_TOLERANCE,
            condition_threshold: DEFAULT_CONDITION_THRESHOLD,
        }
    }
}

impl PrepareConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.subsystem_dim, 2 | 4) {
            return Err(format!(
                "subsystem_dim must be 2 or 4, got {}",
                self.subsystem_dim
            ));
        }
        if !(self.hermitian_tolerance >= 0.0 && self.hermitian_tolerance.is_finite()) {
            return Err("hermitian_tolerance must be a finite non-negative number".into());
        }
        if !(self.condition_threshold >= 1.0) {
            return Err("condition_threshold must be at least 1".into());
        }
        Ok(())
    }
}

/// The Hermitian, normalized block produced by [`MatrixPreparer::prepare`].
///
/// `a_sub` is scaled so its spectral radius is 1 and `b_sub` has unit
/// 2-norm, unless the restricted right-hand side vanishes: then `b_sub` is
/// zero and `norm_factor` is 0. The original block is
/// `a_sub * matrix_scale` with right-hand side `b_sub * norm_factor`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSubsystem {
    a_sub: Array2<f64>,
    b_sub: Array1<f64>,
    norm_factor: f64,
    matrix_scale: f64,
    eigen: SymmetricEigen,
    condition_number: f64,
    source_indices: Vec<usize>,
    full_dim: usize,
}

impl PreparedSubsystem {
    pub fn a_sub(&self) -> &Array2<f64> {
        &self.a_sub
    }

    pub fn b_sub(&self) -> &Array1<f64> {
        &self.b_sub
    }

    /// 2-norm of the restricted right-hand side before normalization.
    pub fn norm_factor(&self) -> f64 {
        self.norm_factor
    }

    /// The restricted right-hand side is zero, so the block solution is too.
    pub fn has_zero_rhs(&self) -> bool {
        self.norm_factor == 0.0
    }

    /// Spectral radius of the symmetrized block before scaling.
    pub fn matrix_scale(&self) -> f64 {
        self.matrix_scale
    }

    /// Eigenpairs of the scaled block (eigenvalues in `[-1, 1]`).
    pub fn eigen(&self) -> &SymmetricEigen {
        &self.eigen
    }

    pub fn condition_number(&self) -> f64 {
        self.condition_number
    }

    /// Positions of the block in the full system, ascending.
    pub fn source_indices(&self) -> &[usize] {
        &self.source_indices
    }

    /// Size of the system the block was cut from.
    pub fn full_dim(&self) -> usize {
        self.full_dim
    }

    pub fn dim(&self) -> usize {
        self.source_indices.len()
    }

    /// The unscaled symmetrized block and right-hand side.
    pub fn original_block(&self) -> (Array2<f64>, Array1<f64>) {
        (
            &self.a_sub * self.matrix_scale,
            &self.b_sub * self.norm_factor,
        )
    }

    /// Map a solution of the scaled block back to the original block's
    /// units.
    pub fn rescale(&self, scaled_solution: &Array1<f64>) -> Array1<f64> {
        scaled_solution * (self.norm_factor / self.matrix_scale)
    }

    /// Zero-pad a block-sized vector to the full system length, placing
    /// entry `i` at `source_indices[i]`.
    pub fn embed(&self, block: &Array1<f64>) -> Array1<f64> {
        let mut full = Array1::zeros(self.full_dim);
        for (&index, &value) in self.source_indices.iter().zip(block.iter()) {
            full[index] = value;
        }
        full
    }
}

/// Extracts, validates and normalizes the subsystem handed to the circuit
/// simulator.
#[derive(Debug, Clone, Default)]
pub struct MatrixPreparer {
    config: PrepareConfig,
}

impl MatrixPreparer {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrepareConfig {
        &self.config
    }

    /// Prepare with the configured default strategy.
    pub fn prepare_default(&self, system: &LinearSystem) -> PrepareResult<PreparedSubsystem> {
        self.prepare(system, self.config.strategy)
    }

    /// Cut a `k x k` block out of `system`, check it is Hermitian and well
    /// conditioned, and normalize it.
    pub fn prepare(
        &self,
        system: &LinearSystem,
        strategy: SubmatrixStrategy,
    ) -> PrepareResult<PreparedSubsystem> {
        if let Some(problem) = system.shape_problem() {
            return Err(PrepareError::MatrixShape(problem));
        }
        let k = self.config.subsystem_dim;
        if !matches!(k, 2 | 4) {
            return Err(PrepareError::MatrixShape(format!(
                "subsystem dimension {k} is not supported"
            )));
        }
        let n = system.dim();
        if n < k {
            return Err(PrepareError::MatrixShape(format!(
                "system of size {n} is smaller than the {k}x{k} subsystem"
            )));
        }

        let source_indices = strategy.select(system, k);
        let raw = system.a().principal_submatrix(&source_indices);
        let b_raw = Array1::from_iter(source_indices.iter().map(|&i| system.b()[i]));

        let asymmetry = (&raw - &raw.t()).iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let magnitude = raw.iter().fold(1.0f64, |m, v| m.max(v.abs()));
        let tolerance = self.config.hermitian_tolerance * magnitude;
        if asymmetry > tolerance {
            return Err(PrepareError::NonHermitian {
                asymmetry,
                tolerance,
            });
        }
        let symmetric = (&raw + &raw.t()) * 0.5;

        let eigen = symmetric_eigen(&symmetric);
        let matrix_scale = eigen.spectral_radius();
        let condition_number = eigen.condition_number();
        if matrix_scale == 0.0 || !(condition_number <= self.config.condition_threshold) {
            return Err(PrepareError::IllConditioned {
                condition_number,
                threshold: self.config.condition_threshold,
            });
        }

        let mut norm_factor = b_raw.dot(&b_raw).sqrt();
        let b_sub = if norm_factor < MIN_RHS_NORM {
            norm_factor = 0.0;
            Array1::zeros(k)
        } else {
            b_raw / norm_factor
        };

        debug!(
            strategy = strategy.name(),
            ?source_indices,
            condition_number,
            matrix_scale,
            norm_factor,
            "prepared subsystem"
        );

        let scaled_eigen = SymmetricEigen {
            values: &eigen.values / matrix_scale,
            vectors: eigen.vectors,
        };

        Ok(PreparedSubsystem {
            a_sub: symmetric / matrix_scale,
            b_sub,
            norm_factor,
            matrix_scale,
            eigen: scaled_eigen,
            condition_number,
            source_indices,
            full_dim: n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CsrMatrix;
    use ndarray::array;

    fn preparer() -> MatrixPreparer {
        MatrixPreparer::new(PrepareConfig::default())
    }

    #[test]
    fn leading_block_is_normalized() {
        let a = array![[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 1.0]];
        let system = LinearSystem::from_dense(&a, array![3.0, 4.0, 9.0]).unwrap();
        let prepared = preparer()
            .prepare(&system, SubmatrixStrategy::LeadingBlock)
            .unwrap();
        assert_eq!(prepared.source_indices(), &[0, 1]);
        assert_eq!(prepared.matrix_scale(), 4.0);
        assert_eq!(prepared.norm_factor(), 5.0);
        assert_eq!(prepared.a_sub(), &array![[0.5, 0.0], [0.0, 1.0]]);
        assert_eq!(prepared.b_sub(), &array![0.6, 0.8]);
        assert!((prepared.condition_number() - 2.0).abs() < 1e-15);
    }

    #[test]
    fn dominant_diagonal_picks_largest_entries() {
        let a = CsrMatrix::from_diagonal(&[1.0, 5.0, -7.0, 5.0]);
        let system = LinearSystem::new(a, array![1.0, 1.0, 1.0, 1.0]).unwrap();
        let prepared = preparer()
            .prepare(&system, SubmatrixStrategy::DominantDiagonal)
            .unwrap();
        // |-7| first, then the tie 5/5 goes to index 1
        assert_eq!(prepared.source_indices(), &[1, 2]);
    }

    #[test]
    fn small_asymmetry_is_symmetrized() {
        let a = array![[2.0, 1.0 + 1e-12], [1.0, 2.0]];
        let system = LinearSystem::from_dense(&a, array![1.0, 0.0]).unwrap();
        let prepared = preparer().prepare_default(&system).unwrap();
        let a = prepared.a_sub();
        assert_eq!(a[[0, 1]], a[[1, 0]]);
    }

    #[test]
    fn asymmetric_block_rejected() {
        let system =
            LinearSystem::from_dense(&array![[2.0, 1.0], [0.0, 2.0]], array![1.0, 1.0]).unwrap();
        let err = preparer().prepare_default(&system).unwrap_err();
        assert!(matches!(err, PrepareError::NonHermitian { .. }));
    }

    #[test]
    fn ill_conditioned_block_rejected() {
        let system =
            LinearSystem::from_dense(&array![[1.0, 0.0], [0.0, 1e-12]], array![1.0, 1.0]).unwrap();
        let err = preparer().prepare_default(&system).unwrap_err();
        assert!(matches!(err, PrepareError::IllConditioned { .. }));
    }

    #[test]
    fn zero_matrix_is_ill_conditioned() {
        let a = CsrMatrix::from_diagonal(&[0.0, 0.0]);
        let system = LinearSystem::new(a, array![1.0, 1.0]).unwrap();
        assert!(matches!(
            preparer().prepare_default(&system),
            Err(PrepareError::IllConditioned { .. })
        ));
    }

    #[test]
    fn zero_rhs_gives_zero_block() {
        let a = array![[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]];
        let system = LinearSystem::from_dense(&a, array![0.0, 0.0, 1.0]).unwrap();
        let p = preparer().prepare_default(&system).unwrap();
        assert!(p.has_zero_rhs());
        assert_eq!(p.norm_factor(), 0.0);
        assert_eq!(p.b_sub(), &array![0.0, 0.0]);
        assert_eq!(p.rescale(&array![1.0, 1.0]), array![0.0, 0.0]);
    }

    #[test]
    fn too_small_system_rejected() {
        let config = PrepareConfig {
            subsystem_dim: 4,
            ..PrepareConfig::default()
        };
        let system =
            LinearSystem::from_dense(&array![[2.0, 0.0], [0.0, 2.0]], array![1.0, 1.0]).unwrap();
        let err = MatrixPreparer::new(config).prepare_default(&system).unwrap_err();
        assert!(matches!(err, PrepareError::MatrixShape(_)));
    }

    #[test]
    fn embed_places_values_at_source_indices() {
        let a = CsrMatrix::from_diagonal(&[1.0, 9.0, 1.0, 8.0]);
        let system = LinearSystem::new(a, array![1.0, 1.0, 1.0, 1.0]).unwrap();
        let prepared = preparer()
            .prepare(&system, SubmatrixStrategy::DominantDiagonal)
            .unwrap();
        let full = prepared.embed(&array![0.25, 0.5]);
        assert_eq!(full, array![0.0, 0.25, 0.0, 0.5]);
    }

    #[test]
    fn strategy_parses_from_cli_spelling() {
        assert_eq!(
            "dominant-diagonal".parse::<SubmatrixStrategy>().unwrap(),
            SubmatrixStrategy::DominantDiagonal
        );
        assert!("random".parse::<SubmatrixStrategy>().is_err());
    }
}
