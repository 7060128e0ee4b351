//! The hybrid orchestrator: job registry and lifecycle API.
//!
//! Each submitted job runs on its own blocking worker; the registry is the
//! only shared state, and the job's runner is the only writer of its status
//! apart from [`HybridOrchestrator::cancel`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use qflood_linalg::{ArrayArtifact, LinearSystem};
use rustc_hash::FxHashMap;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use crate::attempt::SolveAttempt;
use crate::config::SolverConfig;
use crate::error::{SchedError, SchedResult};
use crate::job::{Job, JobFilter, JobId, JobStatus, JobSummary, SolverType};
use crate::plan::{SolvePlan, SolverEngines, StageControl};
use crate::sink::{ArtifactSink, MemorySink, job_key, sink_from_config};

type Registry = Arc<RwLock<FxHashMap<JobId, Job>>>;

/// Accepts solve jobs, runs their plans and answers lifecycle queries.
pub struct HybridOrchestrator {
    jobs: Registry,
    engines: Arc<SolverEngines>,
    sink: Arc<dyn ArtifactSink>,
    next_sequence: AtomicU64,
    poll_interval: Duration,
}

impl std::fmt::Debug for HybridOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridOrchestrator")
            .field("engines", &self.engines)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Default for HybridOrchestrator {
    fn default() -> Self {
        Self::with_parts(SolverEngines::default(), Arc::new(MemorySink::new()))
    }
}

impl HybridOrchestrator {
    /// Build engines and the artifact sink from configuration.
    pub fn new(config: &SolverConfig) -> SchedResult<Self> {
        config.validate()?;
        let sink = sink_from_config(&config.artifacts)?;
        Ok(Self::with_parts(SolverEngines::from_config(config), sink)
            .with_poll_interval(config.manager.poll_interval()))
    }

    pub fn with_parts(engines: SolverEngines, sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(FxHashMap::default())),
            engines: Arc::new(engines),
            sink,
            next_sequence: AtomicU64::new(0),
            poll_interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn sink(&self) -> &Arc<dyn ArtifactSink> {
        &self.sink
    }

    /// Submit a system with a seed derived from the job id.
    pub async fn submit(
        &self,
        system: LinearSystem,
        solver_type: SolverType,
    ) -> SchedResult<JobId> {
        self.submit_with_seed(system, solver_type, None).await
    }

    /// Submit a system. The input arrays are stored before the job is
    /// registered; a sink failure rejects the submission.
    #[instrument(skip(self, system), fields(n = system.dim()))]
    pub async fn submit_with_seed(
        &self,
        system: LinearSystem,
        solver_type: SolverType,
        seed: Option<u64>,
    ) -> SchedResult<JobId> {
        let mut job = Job::new(system, solver_type, seed);
        job.sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let id = job.id;

        let inputs = store_inputs(self.sink.as_ref(), &job).await?;
        job.artifacts.extend(inputs);

        let plan = SolvePlan::for_job(&job);
        let system = job.system.clone();
        self.jobs.write().await.insert(id, job);
        info!(job_id = %id, %solver_type, "job submitted");

        let runner = JobRunner {
            jobs: self.jobs.clone(),
            engines: self.engines.clone(),
            sink: self.sink.clone(),
        };
        tokio::spawn(runner.run(id, plan, system));
        Ok(id)
    }

    /// Get the status of a job.
    pub async fn get_status(&self, id: &JobId) -> SchedResult<JobStatus> {
        self.with_job(id, |job| job.status).await
    }

    /// Attempts recorded so far, in the order they finished.
    pub async fn get_result(&self, id: &JobId) -> SchedResult<Vec<SolveAttempt>> {
        self.with_job(id, |job| job.attempts.clone()).await
    }

    /// Snapshot of the full job record.
    pub async fn get_job(&self, id: &JobId) -> SchedResult<Job> {
        self.with_job(id, Job::clone).await
    }

    /// Cancel a job. Terminal jobs are left as they are; the returned
    /// status is the job's status after the call.
    pub async fn cancel(&self, id: &JobId) -> SchedResult<JobStatus> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| SchedError::JobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            debug!(job_id = %id, status = %job.status, "cancel ignored for terminal job");
            return Ok(job.status);
        }
        job.transition(JobStatus::Cancelled)?;
        info!(job_id = %id, "job cancelled");
        Ok(JobStatus::Cancelled)
    }

    /// List jobs in submission order.
    pub async fn list_jobs(&self, filter: &JobFilter) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<&Job> = jobs.values().filter(|j| filter.matches(j)).collect();
        matching.sort_by_key(|j| j.sequence);
        matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .map(Job::summary)
            .collect()
    }

    /// Poll until the job is terminal and its artifacts are written.
    pub async fn wait(&self, id: &JobId, timeout: Option<Duration>) -> SchedResult<Job> {
        let start = Instant::now();
        let mut ticker = interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Some(job) = self.with_job(id, |job| job.settled.then(|| job.clone())).await? {
                return Ok(job);
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                return Err(SchedError::Timeout(id.to_string()));
            }
        }
    }

    async fn with_job<T>(&self, id: &JobId, f: impl FnOnce(&Job) -> T) -> SchedResult<T> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(f)
            .ok_or_else(|| SchedError::JobNotFound(id.to_string()))
    }
}

/// Owns clones of the shared handles for one job's background task.
struct JobRunner {
    jobs: Registry,
    engines: Arc<SolverEngines>,
    sink: Arc<dyn ArtifactSink>,
}

impl JobRunner {
    async fn run(self, id: JobId, plan: SolvePlan, system: Arc<LinearSystem>) {
        let jobs = self.jobs.clone();
        let engines = self.engines.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let mut control = RegistryControl { jobs, id };
            plan.run(&engines, &system, &mut control)
        })
        .await;

        match outcome {
            Ok(attempts) => debug!(job_id = %id, attempts = attempts.len(), "plan finished"),
            Err(e) => {
                error!(job_id = %id, error = %e, "solver task died");
                if let Some(job) = self.jobs.write().await.get_mut(&id) {
                    job.abort();
                }
            }
        }

        self.store_outputs(id).await;

        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.settled = true;
            info!(job_id = %id, status = %job.status, "job finished");
        }
    }

    async fn store_outputs(&self, id: JobId) {
        let snapshot = self.jobs.read().await.get(&id).cloned();
        let Some(job) = snapshot else {
            return;
        };
        let Some(attempt) = job.final_solution() else {
            return;
        };
        match store_result(self.sink.as_ref(), &job, attempt).await {
            Ok(uris) => {
                if let Some(job) = self.jobs.write().await.get_mut(&id) {
                    job.artifacts.extend(uris);
                }
            }
            Err(e) => warn!(job_id = %id, error = %e, "failed to store result artifacts"),
        }
    }
}

/// [`StageControl`] over a job held in the shared registry. Only used from
/// blocking worker threads.
struct RegistryControl {
    jobs: Registry,
    id: JobId,
}

impl StageControl for RegistryControl {
    fn advance(&mut self, next: JobStatus) -> SchedResult<()> {
        match self.jobs.blocking_write().get_mut(&self.id) {
            Some(job) => job.advance(next),
            None => Err(SchedError::JobNotFound(self.id.to_string())),
        }
    }

    fn record(&mut self, attempt: SolveAttempt) -> SolveAttempt {
        match self.jobs.blocking_write().get_mut(&self.id) {
            Some(job) => job.record(attempt),
            None => attempt.discard(),
        }
    }

    fn fallback(&mut self, reason: String) {
        if let Some(job) = self.jobs.blocking_write().get_mut(&self.id) {
            job.fallback(reason);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.jobs
            .blocking_read()
            .get(&self.id)
            .is_none_or(|job| job.is_cancelled())
    }
}

async fn store_inputs(sink: &dyn ArtifactSink, job: &Job) -> SchedResult<Vec<(String, String)>> {
    let matrix = ArrayArtifact::from_csr(job.system.a()).to_bytes()?;
    let vector = ArrayArtifact::from_vector(job.system.b()).to_bytes()?;
    let matrix_uri = sink.store(matrix, &job_key(&job.id, "matrix_a.json")).await?;
    let vector_uri = sink.store(vector, &job_key(&job.id, "vector_b.json")).await?;
    Ok(vec![
        ("matrix_a".to_string(), matrix_uri),
        ("vector_b".to_string(), vector_uri),
    ])
}

async fn store_result(
    sink: &dyn ArtifactSink,
    job: &Job,
    attempt: &SolveAttempt,
) -> SchedResult<Vec<(String, String)>> {
    let solution = attempt
        .solution
        .as_deref()
        .ok_or_else(|| SchedError::Internal("successful attempt has no solution".into()))?;
    let name = format!("solution_{}", attempt.method);
    let bytes = ArrayArtifact::from_slice(solution).to_bytes()?;
    let solution_uri = sink.store(bytes, &job_key(&job.id, &format!("{name}.json"))).await?;

    let attempts: Vec<_> = job
        .attempts
        .iter()
        .map(|a| {
            json!({
                "method": a.method,
                "status": a.status,
                "error": a.error,
                "diagnostics": a.diagnostics,
                "started_at": a.started_at,
                "completed_at": a.completed_at,
            })
        })
        .collect();
    let diagnostics = json!({
        "job_id": job.id,
        "solver_type": job.solver_type,
        "status": job.status,
        "solved_by": attempt.method,
        "fallback_reason": job.fallback_reason,
        "attempts": attempts,
    });
    let diagnostics_uri = sink
        .store(
            serde_json::to_vec_pretty(&diagnostics)?,
            &job_key(&job.id, "diagnostics.json"),
        )
        .await?;

    Ok(vec![
        (name, solution_uri),
        ("diagnostics".to_string(), diagnostics_uri),
    ])
}
