//! Job lifecycle tests against the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use ndarray::{Array1, array};
use qflood_linalg::{ArrayArtifact, ClassicalSolver, CsrMatrix, LinearSystem};
use qflood_sched::{
    ArtifactSink, AttemptStatus, ErrorKind, FsSink, HybridOrchestrator, JobFilter, JobStatus,
    MemorySink, SchedError, SolveMethod, SolverConfig, SolverEngines, SolverType,
};
use qflood_sim::{
    Circuit, QuantumCircuitSolver, QuantumConfig, QuantumError, QuantumResult, Statevector,
    StatevectorBackend,
};

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(30));

fn diag_system() -> LinearSystem {
    LinearSystem::from_dense(&array![[2.0, 0.0], [0.0, 2.0]], array![1.0, 1.0]).unwrap()
}

/// Full system whose leading 2x2 block has condition number 1e12.
fn ill_conditioned_system() -> LinearSystem {
    let a = CsrMatrix::from_dense(&array![
        [1.0, 0.0, 0.5],
        [0.0, 1e-12, 0.0],
        [0.5, 0.0, 3.0]
    ]);
    LinearSystem::new(a, array![1.0, 2e-12, 2.0]).unwrap()
}

fn singular_system() -> LinearSystem {
    LinearSystem::from_dense(&array![[1.0, 2.0], [2.0, 4.0]], array![1.0, 1.0]).unwrap()
}

struct OfflineBackend;

impl StatevectorBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn run(&self, _circuit: &Circuit) -> QuantumResult<Statevector> {
        Err(QuantumError::StatevectorUnavailable("device offline".into()))
    }
}

// ---------------------------------------------------------------------------
// Solver paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn classical_diagonal_system() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator
        .submit(diag_system(), SolverType::Classical)
        .await
        .unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts.len(), 1);
    let attempt = &job.attempts[0];
    assert_eq!(attempt.method, SolveMethod::Classical);
    assert_eq!(attempt.solution, Some(vec![0.5, 0.5]));
    assert_eq!(attempt.diagnostics.residual, Some(0.0));
    assert!(job.fallback_reason.is_none());
}

#[tokio::test]
async fn quantum_runs_reproduce_with_the_same_seed() {
    let orchestrator = HybridOrchestrator::default();
    let mut results = Vec::new();
    for seed in [5, 5, 6, 7, 8] {
        let id = orchestrator
            .submit_with_seed(diag_system(), SolverType::Quantum, Some(seed))
            .await
            .unwrap();
        let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        results.push(job.attempts[0].clone());
    }

    let (a, b, c) = (&results[0], &results[1], &results[2]);
    assert_eq!(a.solution, b.solution);
    assert_eq!(a.diagnostics.ancilla_success_rate, b.diagnostics.ancilla_success_rate);
    assert_eq!(a.diagnostics.seed, Some(5));
    assert_eq!(c.diagnostics.seed, Some(6));

    // The success branch carries less than the full probability, so other
    // seeds sample different rates.
    let rates: Vec<f64> = results[1..]
        .iter()
        .map(|r| r.diagnostics.ancilla_success_rate.unwrap())
        .collect();
    assert!(rates.iter().all(|&r| r < 1.0), "{rates:?}");
    assert!(rates.windows(2).any(|w| w[0] != w[1]), "{rates:?}");
    for (x, y) in a.solution.as_ref().unwrap().iter().zip(c.solution.as_ref().unwrap()) {
        assert!((x - y).abs() < 1e-9);
    }
    let solution = a.solution.as_ref().unwrap();
    assert!((solution[0] - 0.5).abs() < 1e-9);
    assert!((solution[1] - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn zero_rhs_on_block_completes_without_fallback() {
    let tridiagonal = array![[4.0, -1.0, 0.0], [-1.0, 4.0, -1.0], [0.0, -1.0, 4.0]];
    let orchestrator = HybridOrchestrator::default();
    for solver_type in [SolverType::Hybrid, SolverType::Quantum] {
        let system = LinearSystem::from_dense(&tridiagonal, array![0.0, 0.0, 1.0]).unwrap();
        let id = orchestrator.submit(system, solver_type).await.unwrap();
        let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed, "{solver_type}");
        assert!(job.fallback_reason.is_none());
        assert_eq!(job.attempts.len(), 1);
        assert_eq!(job.attempts[0].solution, Some(vec![0.0, 0.0, 0.0]));
        assert_eq!(job.attempts[0].diagnostics.ancilla_success_rate, Some(1.0));
    }
}

#[tokio::test]
async fn hybrid_ill_conditioned_falls_back_to_full_classical_solve() {
    let system = ill_conditioned_system();
    let expected = ClassicalSolver::default().solve_system(&system).unwrap().solution;

    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator.submit(system, SolverType::Hybrid).await.unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::FallbackClassicalCompleted);
    let statuses: Vec<_> = job.history.iter().map(|c| c.status).collect();
    assert!(statuses.contains(&JobStatus::QuantumFailedFallbackInitiated));
    assert!(statuses.contains(&JobStatus::FallbackClassicalRunning));
    assert!(job.fallback_reason.as_deref().unwrap().contains("ill-conditioned"));

    assert_eq!(job.attempts.len(), 2);
    assert_eq!(job.attempts[0].error_kind(), Some(ErrorKind::IllConditioned));
    let solution = job.attempts[1].solution.as_ref().unwrap();
    assert_eq!(solution.len(), 3);
    assert_eq!(Array1::from(solution.clone()), expected);
}

#[tokio::test]
async fn hybrid_falls_back_when_statevector_unavailable() {
    let engines = SolverEngines {
        quantum: QuantumCircuitSolver::with_backend(
            QuantumConfig::default(),
            Arc::new(OfflineBackend),
        ),
        ..SolverEngines::default()
    };
    let orchestrator = HybridOrchestrator::with_parts(engines, Arc::new(MemorySink::new()));
    let id = orchestrator.submit(diag_system(), SolverType::Hybrid).await.unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::FallbackClassicalCompleted);
    assert!(job.fallback_reason.is_some());
    assert_eq!(
        job.attempts[0].error_kind(),
        Some(ErrorKind::StatevectorUnavailable)
    );
    assert_eq!(job.attempts[1].solution, Some(vec![0.5, 0.5]));
}

#[tokio::test]
async fn hybrid_falls_back_on_low_success_rate() {
    let orchestrator = HybridOrchestrator::default();
    let system =
        LinearSystem::from_dense(&array![[1.0, 0.0], [0.0, 0.01]], array![1.0, 0.001]).unwrap();
    let id = orchestrator.submit(system, SolverType::Hybrid).await.unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::FallbackClassicalCompleted);
    assert_eq!(job.attempts[0].error_kind(), Some(ErrorKind::LowSuccessRate));
    assert!(job.fallback_reason.is_some());
}

#[tokio::test]
async fn quantum_only_failure_is_reported() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator
        .submit(ill_conditioned_system(), SolverType::Quantum)
        .await
        .unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.fallback_reason.is_none());
    assert_eq!(job.attempts.len(), 1);
}

#[tokio::test]
async fn singular_classical_job_fails() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator
        .submit(singular_system(), SolverType::Classical)
        .await
        .unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts[0].status, AttemptStatus::Failed);
    assert_eq!(job.attempts[0].error_kind(), Some(ErrorKind::SingularMatrix));
    assert!(!job.artifacts.contains_key("solution_classical"));
}

// ---------------------------------------------------------------------------
// Lifecycle API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_result_is_idempotent() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator.submit(diag_system(), SolverType::Hybrid).await.unwrap();
    orchestrator.wait(&id, TIMEOUT).await.unwrap();

    let first = orchestrator.get_result(&id).await.unwrap();
    let second = orchestrator.get_result(&id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        orchestrator.get_status(&id).await.unwrap(),
        JobStatus::Completed
    );
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let orchestrator = HybridOrchestrator::default();
    let id = qflood_sched::JobId::new();
    assert!(matches!(
        orchestrator.get_result(&id).await,
        Err(SchedError::JobNotFound(_))
    ));
    assert!(matches!(
        orchestrator.cancel(&id).await,
        Err(SchedError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn cancel_is_absorbing_and_terminal_jobs_ignore_it() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator.submit(diag_system(), SolverType::Classical).await.unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    assert_eq!(orchestrator.cancel(&id).await.unwrap(), JobStatus::Completed);
    assert_eq!(orchestrator.get_status(&id).await.unwrap(), JobStatus::Completed);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator.submit(diag_system(), SolverType::Hybrid).await.unwrap();
    // The runner has not been polled yet on a current-thread runtime.
    assert_eq!(orchestrator.cancel(&id).await.unwrap(), JobStatus::Cancelled);

    let job = orchestrator.wait(&id, None).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.attempts.is_empty());
    assert_eq!(orchestrator.cancel(&id).await.unwrap(), JobStatus::Cancelled);
}

#[tokio::test]
async fn list_jobs_filters_and_pages_in_submission_order() {
    let orchestrator = HybridOrchestrator::default();
    let mut ids = Vec::new();
    for solver_type in [SolverType::Classical, SolverType::Hybrid, SolverType::Classical] {
        let id = orchestrator.submit(diag_system(), solver_type).await.unwrap();
        orchestrator.wait(&id, TIMEOUT).await.unwrap();
        ids.push(id);
    }

    let all = orchestrator.list_jobs(&JobFilter::all()).await;
    assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), ids);

    let classical = orchestrator
        .list_jobs(&JobFilter::all().with_solver_type(SolverType::Classical))
        .await;
    assert_eq!(classical.len(), 2);

    let page = orchestrator
        .list_jobs(&JobFilter::all().with_offset(1).with_limit(1))
        .await;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[1]);

    let failed = orchestrator
        .list_jobs(&JobFilter::all().with_status(vec![JobStatus::Failed]))
        .await;
    assert!(failed.is_empty());
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn artifacts_round_trip_through_filesystem_sink() {
    let dir = tempfile::tempdir().unwrap();
    let sink: Arc<dyn ArtifactSink> = Arc::new(FsSink::new(dir.path()));
    let orchestrator = HybridOrchestrator::with_parts(SolverEngines::default(), sink.clone());

    let b = array![0.1, 1.0 / 3.0, 2.0_f64.sqrt()];
    let a = CsrMatrix::from_dense(&array![[4.0, -1.0, 0.0], [-1.0, 4.0, -1.0], [0.0, -1.0, 4.0]]);
    let system = LinearSystem::new(a.clone(), b.clone()).unwrap();
    let id = orchestrator.submit(system, SolverType::Classical).await.unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    let stored_a = sink.load(&job.artifacts["matrix_a"]).await.unwrap();
    let stored_b = sink.load(&job.artifacts["vector_b"]).await.unwrap();
    assert_eq!(ArrayArtifact::from_bytes(&stored_a).unwrap().into_csr().unwrap(), a);
    assert_eq!(ArrayArtifact::from_bytes(&stored_b).unwrap().into_vector().unwrap(), b);

    let stored_x = sink.load(&job.artifacts["solution_classical"]).await.unwrap();
    let x = ArrayArtifact::from_bytes(&stored_x).unwrap().into_vector().unwrap();
    assert_eq!(Some(x.to_vec()), job.attempts[0].solution);

    let diagnostics = sink.load(&job.artifacts["diagnostics"]).await.unwrap();
    let diagnostics: serde_json::Value = serde_json::from_slice(&diagnostics).unwrap();
    assert_eq!(diagnostics["status"], "COMPLETED");
    assert_eq!(diagnostics["solved_by"], "classical");
}

#[tokio::test]
async fn fallback_result_artifact_names_the_classical_attempt() {
    let orchestrator = HybridOrchestrator::default();
    let id = orchestrator
        .submit(ill_conditioned_system(), SolverType::Hybrid)
        .await
        .unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();
    assert!(job.artifacts.contains_key("solution_classical"));
    assert!(!job.artifacts.contains_key("solution_quantum"));
    assert!(job.artifacts["diagnostics"].starts_with("mem://jobs/"));
}

#[tokio::test]
async fn orchestrator_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        "artifacts:\n  backend: filesystem\n  root: {}\nquantum:\n  shots: 256\n",
        dir.path().display()
    );
    let config = SolverConfig::from_yaml_str(&yaml).unwrap();
    let orchestrator = HybridOrchestrator::new(&config).unwrap();
    let id = orchestrator.submit(diag_system(), SolverType::Quantum).await.unwrap();
    let job = orchestrator.wait(&id, TIMEOUT).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts[0].diagnostics.shots, Some(256));
    assert!(dir
        .path()
        .join(format!("jobs/{id}/solution_quantum.json"))
        .exists());
}
