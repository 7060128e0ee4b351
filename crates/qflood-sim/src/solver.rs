//! The quantum solve: build, simulate, sample, post-select, decode.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::Array1;
use qflood_linalg::{ClassicalSolver, PreparedSubsystem};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::backend::{DEFAULT_MAX_QUBITS, ExactBackend, StatevectorBackend};
use crate::error::{QuantumError, QuantumResult};
use crate::inversion::{RegisterLayout, build_inversion_circuit};
use crate::sampler::{Counts, ShotSampler};

pub const DEFAULT_EVAL_QUBITS: usize = 2;
pub const DEFAULT_SHOTS: u32 = 1024;
pub const DEFAULT_MIN_SUCCESS_RATE: f64 = 0.05;
pub const DEFAULT_EIGENVALUE_CLAMP: f64 = 1e-6;
pub const DEFAULT_INVERSION_SCALE: f64 = 0.75;

/// Tunables for [`QuantumCircuitSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumConfig {
    /// Qubits in the eigenvalue register; must satisfy `2^m >= k`.
    #[serde(default = "default_eval_qubits")]
    pub eval_qubits: usize,

    #[serde(default = "default_shots")]
    pub shots: u32,

    /// Empirical ancilla success rate below which the attempt fails.
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,

    /// Scaled eigenvalues closer to zero than this are pushed out to it.
    #[serde(default = "default_eigenvalue_clamp")]
    pub eigenvalue_clamp: f64,

    /// Fraction of the smallest clamped eigenvalue used as the inversion
    /// constant `C`. Below 1 every eigencomponent leaves some amplitude in
    /// the failure branch.
    #[serde(default = "default_inversion_scale")]
    pub inversion_scale: f64,

    #[serde(default = "default_max_qubits")]
    pub max_qubits: usize,
}

fn default_eval_qubits() -> usize {
    DEFAULT_EVAL_QUBITS
}

fn default_shots() -> u32 {
    DEFAULT_SHOTS
}

fn default_min_success_rate() -> f64 {
    DEFAULT_MIN_SUCCESS_RATE
}

fn default_eigenvalue_clamp() -> f64 {
    DEFAULT_EIGENVALUE_CLAMP
}

fn default_inversion_scale() -> f64 {
    DEFAULT_INVERSION_SCALE
}

fn default_max_qubits() -> usize {
    DEFAULT_MAX_QUBITS
}

impl Default for QuantumConfig {
    fn default() -> Self {
        Self {
            eval_qubits: DEFAULT_EVAL_QUBITS,
            shots: DEFAULT_SHOTS,
            min_success_rate: DEFAULT_MIN_SUCCESS_RATE,
            eigenvalue_clamp: DEFAULT_EIGENVALUE_CLAMP,
            inversion_scale: DEFAULT_INVERSION_SCALE,
            max_qubits: DEFAULT_MAX_QUBITS,
        }
    }
}

impl QuantumConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.eval_qubits == 0 || self.eval_qubits > 8 {
            return Err(format!(
                "eval_qubits must be between 1 and 8, got {}",
                self.eval_qubits
            ));
        }
        if self.shots == 0 {
            return Err("shots must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err("min_success_rate must lie in [0, 1]".into());
        }
        if !(self.eigenvalue_clamp > 0.0 && self.eigenvalue_clamp < 1.0) {
            return Err("eigenvalue_clamp must lie in (0, 1)".into());
        }
        if !(self.inversion_scale > 0.0 && self.inversion_scale <= 1.0) {
            return Err("inversion_scale must lie in (0, 1]".into());
        }
        if self.max_qubits < 1 + self.eval_qubits + 1 {
            return Err(format!(
                "max_qubits {} cannot hold an ancilla, {} eigenvalue qubits and a state qubit",
                self.max_qubits, self.eval_qubits
            ));
        }
        Ok(())
    }
}

/// Output of a successful quantum solve.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumSolution {
    /// Full-length solution, zero outside `source_indices`.
    pub solution: Array1<f64>,
    /// Solution of the original (unscaled) block.
    pub block_solution: Array1<f64>,
    pub source_indices: Vec<usize>,
    pub counts: Counts,
    /// Shots with the ancilla measured `|1⟩`.
    pub ancilla_success_counts: u32,
    /// Zero when the block had a zero right-hand side and no circuit ran.
    pub shots: u32,
    /// `ancilla_success_counts / shots`, or 1 when no circuit ran.
    pub success_rate: f64,
    /// Probability of the ancilla success branch in the exact state.
    pub exact_success_probability: f64,
    /// Relative error against a classical solve of the same block, when that
    /// solve succeeds.
    pub error_estimate: Option<f64>,
    /// Clamped eigenvalues of the block in original units, ascending.
    pub eigenvalues: Vec<f64>,
    pub num_qubits: usize,
    pub seed: u64,
    pub solve_time: Duration,
}

/// Approximates the solution of a prepared block by simulating an
/// eigenvalue-inversion circuit.
#[derive(Clone)]
pub struct QuantumCircuitSolver {
    config: QuantumConfig,
    backend: Arc<dyn StatevectorBackend>,
    reference: ClassicalSolver,
}

impl std::fmt::Debug for QuantumCircuitSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantumCircuitSolver")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Default for QuantumCircuitSolver {
    fn default() -> Self {
        Self::new(QuantumConfig::default())
    }
}

impl QuantumCircuitSolver {
    /// Solver backed by exact in-memory simulation.
    pub fn new(config: QuantumConfig) -> Self {
        let backend = Arc::new(ExactBackend::new(config.max_qubits));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: QuantumConfig, backend: Arc<dyn StatevectorBackend>) -> Self {
        Self {
            config,
            backend,
            reference: ClassicalSolver::default(),
        }
    }

    /// Use `reference` for the classical block solve behind
    /// `error_estimate`.
    pub fn with_reference(mut self, reference: ClassicalSolver) -> Self {
        self.reference = reference;
        self
    }

    pub fn config(&self) -> &QuantumConfig {
        &self.config
    }

    pub fn reference(&self) -> &ClassicalSolver {
        &self.reference
    }

    /// Solve the prepared block. `seed` drives only the shot sampler: the
    /// returned solution comes from the exact final state.
    #[instrument(skip(self, prepared), fields(k = prepared.dim(), backend = self.backend.name()))]
    pub fn solve(&self, prepared: &PreparedSubsystem, seed: u64) -> QuantumResult<QuantumSolution> {
        let start = Instant::now();
        let shots = self.config.shots;
        if shots == 0 {
            return Err(QuantumError::StatevectorUnavailable(
                "shot count must be positive".into(),
            ));
        }

        if prepared.has_zero_rhs() {
            return Ok(self.zero_solution(prepared, seed, start));
        }

        let built = build_inversion_circuit(
            prepared,
            self.config.eval_qubits,
            self.config.eigenvalue_clamp,
            self.config.inversion_scale,
        )?;
        let layout = &built.layout;
        let state = self.backend.run(&built.circuit)?;
        let probabilities = state.probabilities();

        let exact_success_probability: f64 = probabilities
            .iter()
            .enumerate()
            .filter(|&(i, _)| layout.ancilla_set(i))
            .map(|(_, p)| p)
            .sum();

        let counts = ShotSampler::new(seed).sample(&probabilities, shots);
        let ancilla_success_counts = counts.count_where(|i| layout.ancilla_set(i));
        let success_rate = f64::from(ancilla_success_counts) / f64::from(shots);
        debug!(
            success_rate,
            exact_success_probability, "sampled ancilla success branch"
        );
        if success_rate < self.config.min_success_rate {
            return Err(QuantumError::LowSuccessRate {
                rate: success_rate,
                minimum: self.config.min_success_rate,
                successes: ancilla_success_counts,
                shots,
            });
        }

        // Post-select ancilla = 1 with the eigenvalue register uncomputed.
        let k = prepared.dim();
        let branch = Array1::from_iter((0..k).map(|i| state.amplitude(layout.success_index(i)).re));
        let branch_probability = branch.dot(&branch);
        if !(branch_probability > f64::MIN_POSITIVE) {
            return Err(QuantumError::StatevectorUnavailable(
                "post-selected branch has no amplitude".into(),
            ));
        }
        let normalized = &branch / branch_probability.sqrt();
        let scaled = normalized * (branch_probability.sqrt() / built.inversion_constant);
        let block_solution = prepared.rescale(&scaled);
        let solution = prepared.embed(&block_solution);

        let error_estimate = self.error_estimate(prepared, &block_solution);
        let eigenvalues = built
            .eigenvalues
            .iter()
            .map(|lambda| lambda * prepared.matrix_scale())
            .collect();

        let solve_time = start.elapsed();
        info!(
            success_rate,
            error_estimate = error_estimate.unwrap_or(f64::NAN),
            ?solve_time,
            "quantum solve finished"
        );

        Ok(QuantumSolution {
            solution,
            block_solution,
            source_indices: prepared.source_indices().to_vec(),
            counts,
            ancilla_success_counts,
            shots,
            success_rate,
            exact_success_probability,
            error_estimate,
            eigenvalues,
            num_qubits: built.circuit.num_qubits(),
            seed,
            solve_time,
        })
    }

    /// `A x = 0` on the block: nothing to encode, the answer is exact.
    fn zero_solution(
        &self,
        prepared: &PreparedSubsystem,
        seed: u64,
        start: Instant,
    ) -> QuantumSolution {
        let k = prepared.dim();
        let block_solution = Array1::zeros(k);
        let layout = RegisterLayout::new(self.config.eval_qubits, k.trailing_zeros() as usize);
        debug!(k, "restricted right-hand side is zero, skipping circuit");
        QuantumSolution {
            solution: prepared.embed(&block_solution),
            block_solution,
            source_indices: prepared.source_indices().to_vec(),
            counts: Counts::default(),
            ancilla_success_counts: 0,
            shots: 0,
            success_rate: 1.0,
            exact_success_probability: 1.0,
            error_estimate: Some(0.0),
            eigenvalues: prepared
                .eigen()
                .values
                .iter()
                .map(|lambda| lambda * prepared.matrix_scale())
                .collect(),
            num_qubits: layout.num_qubits(),
            seed,
            solve_time: start.elapsed(),
        }
    }

    fn error_estimate(
        &self,
        prepared: &PreparedSubsystem,
        block_solution: &Array1<f64>,
    ) -> Option<f64> {
        let (a, b) = prepared.original_block();
        let reference = self.reference.solve_dense(&a, &b).ok()?.solution;
        let diff = block_solution - &reference;
        let norm = reference.dot(&reference).sqrt();
        if norm == 0.0 {
            return None;
        }
        Some(diff.dot(&diff).sqrt() / norm)
    }
}
