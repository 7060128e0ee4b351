//! Solve plans: the three solver paths over two engines.
//!
//! A plan drives one job's system through its stages in order and reports
//! every status change and finished attempt through a [`StageControl`].
//! Cancellation is honoured between stages: a stage that is already
//! running finishes, its attempt is recorded as discarded, and no further
//! stage starts.

use std::time::Instant;

use chrono::Utc;
use qflood_linalg::{ClassicalSolver, LinearSystem, MatrixPreparer, PreparedSubsystem};
use qflood_sim::QuantumCircuitSolver;
use tracing::{debug, error, info, instrument, warn};

use crate::attempt::{AttemptError, ErrorKind, SolveAttempt, SolveMethod};
use crate::config::SolverConfig;
use crate::error::{SchedError, SchedResult};
use crate::job::{Job, JobStatus, SolverType};

/// Where a running plan reports progress.
pub trait StageControl {
    /// Move the job to `next`. Fails with [`SchedError::Cancelled`] once
    /// the job has been cancelled.
    fn advance(&mut self, next: JobStatus) -> SchedResult<()>;

    /// Append a finished attempt and return it as stored.
    fn record(&mut self, attempt: SolveAttempt) -> SolveAttempt;

    /// Record why a hybrid job is falling back.
    fn fallback(&mut self, reason: String);

    fn is_cancelled(&self) -> bool;

    /// Stop before the next stage if the job was cancelled.
    fn checkpoint(&self) -> SchedResult<()> {
        if self.is_cancelled() {
            Err(SchedError::Cancelled("cancelled before next stage".into()))
        } else {
            Ok(())
        }
    }
}

impl StageControl for Job {
    fn advance(&mut self, next: JobStatus) -> SchedResult<()> {
        if self.is_cancelled() {
            return Err(SchedError::Cancelled(self.id.to_string()));
        }
        let from = self.status;
        self.transition(next)?;
        debug!(job_id = %self.id, %from, to = %next, "job status changed");
        Ok(())
    }

    fn record(&mut self, attempt: SolveAttempt) -> SolveAttempt {
        let attempt = if self.is_cancelled() {
            attempt.discard()
        } else {
            attempt
        };
        self.attempts.push(attempt.clone());
        self.updated_at = Utc::now();
        attempt
    }

    fn fallback(&mut self, reason: String) {
        self.fallback_reason = Some(reason);
    }

    fn is_cancelled(&self) -> bool {
        Job::is_cancelled(self)
    }
}

/// The preparer and both solvers, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct SolverEngines {
    pub preparer: MatrixPreparer,
    pub classical: ClassicalSolver,
    pub quantum: QuantumCircuitSolver,
}

impl SolverEngines {
    pub fn from_config(config: &SolverConfig) -> Self {
        let classical = ClassicalSolver::new(config.classical.clone());
        Self {
            preparer: MatrixPreparer::new(config.prepare.clone()),
            quantum: QuantumCircuitSolver::new(config.quantum.clone())
                .with_reference(classical.clone()),
            classical,
        }
    }

    /// Classical solve of the full system.
    pub fn classical_attempt(&self, system: &LinearSystem) -> SolveAttempt {
        let started_at = Utc::now();
        let start = Instant::now();
        match self.classical.solve_system(system) {
            Ok(solved) => SolveAttempt::classical(solved, started_at),
            Err(e) => {
                SolveAttempt::failed(SolveMethod::Classical, e.into(), start.elapsed(), started_at)
            }
        }
    }

    /// Preparation, a checkpoint, then the circuit run. `Err` only when
    /// the job was cancelled between the two.
    fn quantum_attempt(
        &self,
        system: &LinearSystem,
        seed: u64,
        control: &dyn StageControl,
    ) -> SchedResult<SolveAttempt> {
        let started_at = Utc::now();
        let start = Instant::now();

        let prepared: PreparedSubsystem = match self.preparer.prepare_default(system) {
            Ok(prepared) => prepared,
            Err(e) => {
                return Ok(SolveAttempt::failed(
                    SolveMethod::Quantum,
                    e.into(),
                    start.elapsed(),
                    started_at,
                ));
            }
        };
        debug!(
            k = prepared.dim(),
            condition_number = prepared.condition_number(),
            "subsystem prepared"
        );

        control.checkpoint()?;

        Ok(match self.quantum.solve(&prepared, seed) {
            Ok(solved) => SolveAttempt::quantum(solved, start.elapsed(), started_at),
            Err(e) => {
                SolveAttempt::failed(SolveMethod::Quantum, e.into(), start.elapsed(), started_at)
            }
        })
    }
}

/// One of the three solver paths, bound to its job's seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePlan {
    Classical,
    Quantum { seed: u64 },
    Hybrid { seed: u64 },
}

impl SolvePlan {
    pub fn new(solver_type: SolverType, seed: u64) -> Self {
        match solver_type {
            SolverType::Classical => SolvePlan::Classical,
            SolverType::Quantum => SolvePlan::Quantum { seed },
            SolverType::Hybrid => SolvePlan::Hybrid { seed },
        }
    }

    pub fn for_job(job: &Job) -> Self {
        Self::new(job.solver_type, job.seed)
    }

    /// Run every stage of the plan and return the attempts it recorded.
    #[instrument(skip_all, fields(plan = ?self, n = system.dim()))]
    pub fn run(
        &self,
        engines: &SolverEngines,
        system: &LinearSystem,
        control: &mut dyn StageControl,
    ) -> Vec<SolveAttempt> {
        let mut attempts = Vec::new();
        match self.drive(engines, system, control, &mut attempts) {
            Ok(()) => {}
            Err(SchedError::Cancelled(_)) => info!("plan stopped: job cancelled"),
            Err(e) => error!(error = %e, "plan aborted"),
        }
        attempts
    }

    fn drive(
        &self,
        engines: &SolverEngines,
        system: &LinearSystem,
        control: &mut dyn StageControl,
        attempts: &mut Vec<SolveAttempt>,
    ) -> SchedResult<()> {
        control.advance(JobStatus::Running)?;

        let seed = match *self {
            SolvePlan::Classical => {
                let attempt = record(control, attempts, engines.classical_attempt(system));
                return control.advance(if attempt.succeeded() {
                    JobStatus::Completed
                } else {
                    JobStatus::Failed
                });
            }
            SolvePlan::Quantum { seed } | SolvePlan::Hybrid { seed } => seed,
        };

        control.advance(JobStatus::QuantumRunning)?;
        let attempt = engines.quantum_attempt(system, seed, &*control)?;
        let attempt = record(control, attempts, attempt);
        control.checkpoint()?;
        if attempt.succeeded() {
            return control.advance(JobStatus::Completed);
        }

        let reason = attempt
            .error
            .clone()
            .unwrap_or_else(|| AttemptError::new(ErrorKind::Internal, "attempt has no error"));
        let falls_back =
            matches!(self, SolvePlan::Hybrid { .. }) && reason.kind.is_fallback_eligible();
        if !falls_back {
            return control.advance(JobStatus::Failed);
        }

        warn!(reason = %reason, "quantum attempt failed, falling back to classical");
        control.advance(JobStatus::QuantumFailedFallbackInitiated)?;
        control.fallback(reason.to_string());
        control.advance(JobStatus::FallbackClassicalRunning)?;

        let attempt = record(control, attempts, engines.classical_attempt(system));
        control.advance(if attempt.succeeded() {
            JobStatus::FallbackClassicalCompleted
        } else {
            JobStatus::FallbackClassicalFailed
        })
    }
}

fn record(
    control: &mut dyn StageControl,
    attempts: &mut Vec<SolveAttempt>,
    attempt: SolveAttempt,
) -> SolveAttempt {
    let stored = control.record(attempt);
    attempts.push(stored.clone());
    stored
}
