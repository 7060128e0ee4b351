//! `qflood-sched`: job lifecycle and hybrid fallback orchestration.
//!
//! A job carries one [`LinearSystem`](qflood_linalg::LinearSystem) and a
//! requested [`SolverType`]. The [`HybridOrchestrator`] picks the matching
//! [`SolvePlan`], runs its stages on a blocking worker, records every
//! [`SolveAttempt`] and drives the job through the [`JobStatus`] state
//! machine. Input arrays, the returned solution and diagnostics go to an
//! [`ArtifactSink`].
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use qflood_linalg::LinearSystem;
//! use qflood_sched::{HybridOrchestrator, JobStatus, SolverType};
//!
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = HybridOrchestrator::default();
//! let system = LinearSystem::from_dense(&array![[2.0, 0.0], [0.0, 2.0]], array![1.0, 1.0])?;
//!
//! let id = orchestrator.submit(system, SolverType::Hybrid).await?;
//! let job = orchestrator.wait(&id, None).await?;
//! assert_eq!(job.status, JobStatus::Completed);
//! # Ok(())
//! # }
//! ```

pub mod attempt;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod plan;
pub mod sink;

pub use attempt::{AttemptError, AttemptStatus, Diagnostics, ErrorKind, SolveAttempt, SolveMethod};
pub use config::{ArtifactBackend, ArtifactConfig, ManagerConfig, SolverConfig};
pub use error::{SchedError, SchedResult};
pub use job::{Job, JobFilter, JobId, JobStatus, JobSummary, SolverType, StatusChange};
pub use orchestrator::HybridOrchestrator;
pub use plan::{SolvePlan, SolverEngines, StageControl};
pub use sink::{ArtifactSink, FsSink, MemorySink, job_key};
