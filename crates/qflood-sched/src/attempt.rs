//! Solve attempts and the error taxonomy recorded on them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use qflood_linalg::{ClassicalMethod, ClassicalSolution, PrepareError, SolveError};
use qflood_sim::{QuantumError, QuantumSolution};
use serde::{Deserialize, Serialize};

/// Closed set of failure kinds a solver stage can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MatrixShape,
    NonHermitian,
    IllConditioned,
    SingularMatrix,
    LowSuccessRate,
    StatevectorUnavailable,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Whether a hybrid job falls back to the classical solver on this kind.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            ErrorKind::LowSuccessRate
                | ErrorKind::StatevectorUnavailable
                | ErrorKind::IllConditioned
                | ErrorKind::NonHermitian
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::MatrixShape => "MatrixShapeError",
            ErrorKind::NonHermitian => "NonHermitianError",
            ErrorKind::IllConditioned => "IllConditionedError",
            ErrorKind::SingularMatrix => "SingularMatrixError",
            ErrorKind::LowSuccessRate => "LowSuccessRateError",
            ErrorKind::StatevectorUnavailable => "StatevectorUnavailableError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error kind plus the solver's message, as stored on a failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AttemptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&PrepareError> for ErrorKind {
    fn from(err: &PrepareError) -> Self {
        match err {
            PrepareError::MatrixShape(_) => ErrorKind::MatrixShape,
            PrepareError::NonHermitian { .. } => ErrorKind::NonHermitian,
            PrepareError::IllConditioned { .. } => ErrorKind::IllConditioned,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<&SolveError> for ErrorKind {
    fn from(err: &SolveError) -> Self {
        match err {
            SolveError::MatrixShape(_) => ErrorKind::MatrixShape,
            SolveError::SingularMatrix(_) => ErrorKind::SingularMatrix,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<&QuantumError> for ErrorKind {
    fn from(err: &QuantumError) -> Self {
        match err {
            QuantumError::LowSuccessRate { .. } => ErrorKind::LowSuccessRate,
            QuantumError::StatevectorUnavailable(_) => ErrorKind::StatevectorUnavailable,
            // A malformed circuit is a builder bug, not a property of the input.
            _ => ErrorKind::Internal,
        }
    }
}

impl From<PrepareError> for AttemptError {
    fn from(err: PrepareError) -> Self {
        Self::new(ErrorKind::from(&err), err.to_string())
    }
}

impl From<SolveError> for AttemptError {
    fn from(err: SolveError) -> Self {
        Self::new(ErrorKind::from(&err), err.to_string())
    }
}

impl From<QuantumError> for AttemptError {
    fn from(err: QuantumError) -> Self {
        Self::new(ErrorKind::from(&err), err.to_string())
    }
}

/// Which engine an attempt ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    Classical,
    Quantum,
}

impl SolveMethod {
    pub fn name(&self) -> &'static str {
        match self {
            SolveMethod::Classical => "classical",
            SolveMethod::Quantum => "quantum",
        }
    }
}

impl fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    /// Finished after the job was cancelled; its solution was dropped.
    Discarded,
}

/// Timing and solver-specific measurements for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Wall-clock seconds spent in the stage.
    pub solve_time: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classical_method: Option<ClassicalMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancilla_success_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancilla_success_counts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_success_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_estimate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eigenvalues: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_indices: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_qubits: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Diagnostics {
    pub fn timed(solve_time: Duration) -> Self {
        Self {
            solve_time: solve_time.as_secs_f64(),
            ..Self::default()
        }
    }
}

/// One run of one engine against a job's system.
///
/// Attempts are appended to the job in the order they finish and are not
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveAttempt {
    pub method: SolveMethod,
    pub status: AttemptStatus,
    /// Full-length solution; `None` unless the attempt succeeded.
    pub solution: Option<Vec<f64>>,
    pub error: Option<AttemptError>,
    pub diagnostics: Diagnostics,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SolveAttempt {
    pub fn classical(solved: ClassicalSolution, started_at: DateTime<Utc>) -> Self {
        let diagnostics = Diagnostics {
            residual: Some(solved.residual),
            classical_method: Some(solved.method),
            ..Diagnostics::timed(solved.solve_time)
        };
        Self {
            method: SolveMethod::Classical,
            status: AttemptStatus::Succeeded,
            solution: Some(solved.solution.to_vec()),
            error: None,
            diagnostics,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// `solve_time` covers preparation as well as the circuit run.
    pub fn quantum(
        solved: QuantumSolution,
        solve_time: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        let diagnostics = Diagnostics {
            ancilla_success_rate: Some(solved.success_rate),
            ancilla_success_counts: Some(solved.ancilla_success_counts),
            shots: Some(solved.shots),
            exact_success_probability: Some(solved.exact_success_probability),
            error_estimate: solved.error_estimate,
            eigenvalues: Some(solved.eigenvalues),
            source_indices: Some(solved.source_indices),
            num_qubits: Some(solved.num_qubits),
            seed: Some(solved.seed),
            ..Diagnostics::timed(solve_time)
        };
        Self {
            method: SolveMethod::Quantum,
            status: AttemptStatus::Succeeded,
            solution: Some(solved.solution.to_vec()),
            error: None,
            diagnostics,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(
        method: SolveMethod,
        error: AttemptError,
        solve_time: Duration,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            method,
            status: AttemptStatus::Failed,
            solution: None,
            error: Some(error),
            diagnostics: Diagnostics::timed(solve_time),
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Drop the solution of an attempt that finished after cancellation.
    pub fn discard(mut self) -> Self {
        self.status = AttemptStatus::Discarded;
        self.solution = None;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
