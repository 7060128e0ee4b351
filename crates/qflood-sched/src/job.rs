//! Job types and the status state machine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use qflood_linalg::LinearSystem;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::SolveAttempt;
use crate::error::{SchedError, SchedResult};

/// Unique identifier for a solve job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a job ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Shot-sampling seed used when the submitter does not pass one.
    pub fn derived_seed(&self) -> u64 {
        let (high, low) = self.0.as_u64_pair();
        high ^ low
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which solver path the submitter asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverType {
    Classical,
    Quantum,
    /// Quantum first, classical on a fallback-eligible failure.
    Hybrid,
}

impl SolverType {
    pub fn name(&self) -> &'static str {
        match self {
            SolverType::Classical => "classical",
            SolverType::Quantum => "quantum",
            SolverType::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SolverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classical" => Ok(SolverType::Classical),
            "quantum" => Ok(SolverType::Quantum),
            "hybrid" => Ok(SolverType::Hybrid),
            other => Err(format!(
                "unknown solver type '{other}', expected classical, quantum or hybrid"
            )),
        }
    }
}

/// Status of a job.
///
/// ```text
/// Pending -> Running -> Completed | Failed                       (classical)
///            Running -> QuantumRunning -> Completed | Failed     (quantum)
///                       QuantumRunning -> QuantumFailedFallbackInitiated
///                         -> FallbackClassicalRunning
///                         -> FallbackClassicalCompleted | FallbackClassicalFailed
/// any non-terminal -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    QuantumRunning,
    QuantumFailedFallbackInitiated,
    FallbackClassicalRunning,
    FallbackClassicalCompleted,
    FallbackClassicalFailed,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::Cancelled
                | JobStatus::FallbackClassicalCompleted
                | JobStatus::FallbackClassicalFailed
        )
    }

    /// Terminal with a solution.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::FallbackClassicalCompleted
        )
    }

    /// Check if a solver stage is executing.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::QuantumRunning | JobStatus::FallbackClassicalRunning
        )
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (Pending, Running)
                | (Running, QuantumRunning | Completed | Failed)
                | (
                    QuantumRunning,
                    Completed | Failed | QuantumFailedFallbackInitiated
                )
                | (QuantumFailedFallbackInitiated, FallbackClassicalRunning)
                | (
                    FallbackClassicalRunning,
                    FallbackClassicalCompleted | FallbackClassicalFailed
                )
        )
    }

    /// Get a short status name.
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::QuantumRunning => "QUANTUM_RUNNING",
            JobStatus::QuantumFailedFallbackInitiated => "QUANTUM_FAILED_FALLBACK_INITIATED",
            JobStatus::FallbackClassicalRunning => "FALLBACK_CLASSICAL_RUNNING",
            JobStatus::FallbackClassicalCompleted => "FALLBACK_CLASSICAL_COMPLETED",
            JobStatus::FallbackClassicalFailed => "FALLBACK_CLASSICAL_FAILED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One entry in a job's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: JobStatus,
    pub at: DateTime<Utc>,
}

/// A submitted solve.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub system: Arc<LinearSystem>,
    pub solver_type: SolverType,
    /// Seed for the quantum stage's shot sampler.
    pub seed: u64,
    pub status: JobStatus,
    pub history: Vec<StatusChange>,
    pub attempts: Vec<SolveAttempt>,
    /// Set when a hybrid job fell back to the classical solver.
    pub fallback_reason: Option<String>,
    /// Artifact name to sink URI.
    pub artifacts: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Submission order, for stable listing.
    pub(crate) sequence: u64,
    /// Terminal and all artifacts written.
    pub(crate) settled: bool,
}

impl Job {
    pub fn new(system: LinearSystem, solver_type: SolverType, seed: Option<u64>) -> Self {
        Self::with_id(JobId::new(), system, solver_type, seed)
    }

    pub fn with_id(
        id: JobId,
        system: LinearSystem,
        solver_type: SolverType,
        seed: Option<u64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            system: Arc::new(system),
            solver_type,
            seed: seed.unwrap_or_else(|| id.derived_seed()),
            status: JobStatus::Pending,
            history: vec![StatusChange {
                status: JobStatus::Pending,
                at: now,
            }],
            attempts: Vec::new(),
            fallback_reason: None,
            artifacts: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            sequence: 0,
            settled: false,
        }
    }

    /// Move to `next`, rejecting anything the state machine does not allow.
    pub fn transition(&mut self, next: JobStatus) -> SchedResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SchedError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.status = next;
        self.history.push(StatusChange {
            status: next,
            at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Force a live job to `Failed` from any stage, bypassing the
    /// transition table. Used when the solver task dies.
    pub(crate) fn abort(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.history.push(StatusChange {
            status: JobStatus::Failed,
            at: now,
        });
        self.updated_at = now;
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == JobStatus::Cancelled
    }

    /// The attempt whose solution the job returns, if it has one.
    pub fn final_solution(&self) -> Option<&SolveAttempt> {
        if !self.status.is_success() {
            return None;
        }
        self.attempts.iter().rev().find(|a| a.succeeded())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            solver_type: self.solver_type,
            status: self.status,
            dim: self.system.dim(),
            attempts: self.attempts.len(),
            fallback_reason: self.fallback_reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight view of a job for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub solver_type: SolverType,
    pub status: JobStatus,
    pub dim: usize,
    pub attempts: usize,
    pub fallback_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Filter for listing jobs, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<Vec<JobStatus>>,

    /// Filter by requested solver path.
    pub solver_type: Option<SolverType>,

    /// Number of matching jobs to skip.
    pub offset: usize,

    /// Maximum number of results.
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            solver_type: None,
            offset: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl JobFilter {
    /// Create a filter matching every job.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter by status.
    pub fn with_status(mut self, status: Vec<JobStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_solver_type(mut self, solver_type: SolverType) -> Self {
        self.solver_type = Some(solver_type);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Check if a job matches this filter.
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(ref statuses) = self.status {
            if !statuses.contains(&job.status) {
                return false;
            }
        }
        if let Some(solver_type) = self.solver_type {
            if job.solver_type != solver_type {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const ALL: [JobStatus; 10] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::QuantumRunning,
        JobStatus::QuantumFailedFallbackInitiated,
        JobStatus::FallbackClassicalRunning,
        JobStatus::FallbackClassicalCompleted,
        JobStatus::FallbackClassicalFailed,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    fn job(solver_type: SolverType) -> Job {
        let system =
            LinearSystem::from_dense(&array![[2.0, 0.0], [0.0, 2.0]], array![1.0, 1.0]).unwrap();
        Job::new(system, solver_type, Some(7))
    }

    #[test]
    fn test_job_id() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.derived_seed(), parsed.derived_seed());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn every_live_state_can_cancel() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(JobStatus::Cancelled));
        }
    }

    #[test]
    fn fallback_path_is_ordered() {
        use JobStatus::*;
        assert!(QuantumRunning.can_transition_to(QuantumFailedFallbackInitiated));
        assert!(!Running.can_transition_to(QuantumFailedFallbackInitiated));
        assert!(!QuantumFailedFallbackInitiated.can_transition_to(FallbackClassicalCompleted));
        assert!(!QuantumFailedFallbackInitiated.can_transition_to(Failed));
        assert!(!FallbackClassicalRunning.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn transition_records_history() {
        let mut j = job(SolverType::Classical);
        j.transition(JobStatus::Running).unwrap();
        j.transition(JobStatus::Completed).unwrap();
        let statuses: Vec<_> = j.history.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![JobStatus::Pending, JobStatus::Running, JobStatus::Completed]
        );

        let err = j.transition(JobStatus::Cancelled).unwrap_err();
        assert!(matches!(err, SchedError::InvalidTransition { .. }));
        assert_eq!(j.status, JobStatus::Completed);
    }

    #[test]
    fn explicit_seed_wins() {
        let j = job(SolverType::Quantum);
        assert_eq!(j.seed, 7);
        let system =
            LinearSystem::from_dense(&array![[1.0, 0.0], [0.0, 1.0]], array![1.0, 0.0]).unwrap();
        let derived = Job::new(system, SolverType::Quantum, None);
        assert_eq!(derived.seed, derived.id.derived_seed());
    }

    #[test]
    fn filter_matches_status_and_type() {
        let j = job(SolverType::Hybrid);
        assert!(JobFilter::all().matches(&j));
        assert!(JobFilter::all()
            .with_status(vec![JobStatus::Pending])
            .matches(&j));
        assert!(!JobFilter::all()
            .with_status(vec![JobStatus::Completed])
            .matches(&j));
        assert!(!JobFilter::all()
            .with_solver_type(SolverType::Classical)
            .matches(&j));
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&JobStatus::FallbackClassicalCompleted).unwrap();
        assert_eq!(json, "\"FALLBACK_CLASSICAL_COMPLETED\"");
        assert_eq!("Hybrid".parse::<SolverType>().unwrap(), SolverType::Hybrid);
    }
}
