//! Helpers shared by CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use qflood_linalg::{ArrayArtifact, FloodParameters, LinearSystem};
use qflood_sched::{AttemptStatus, Job, JobStatus, SolveMethod, SolverConfig};

/// Configuration file used when `--config` is absent, if it exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("qflood").join("config.yaml"))
        .filter(|path| path.is_file())
}

/// Load configuration from `path`, the default location, or defaults, with
/// `QFLOOD_*` overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<SolverConfig> {
    let path = path.map(Path::to_path_buf).or_else(default_config_path);
    SolverConfig::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("failed to load configuration from {}", p.display()),
        None => "invalid configuration".to_string(),
    })
}

/// Read a system from a CSR matrix artifact and a vector artifact.
pub fn load_system(matrix: &Path, vector: &Path) -> Result<LinearSystem> {
    let a = std::fs::read(matrix)
        .with_context(|| format!("failed to read {}", matrix.display()))?;
    let b = std::fs::read(vector)
        .with_context(|| format!("failed to read {}", vector.display()))?;
    let a = ArrayArtifact::from_bytes(&a)?.into_csr()?;
    let b = ArrayArtifact::from_bytes(&b)?.into_vector()?;
    Ok(LinearSystem::new(a, b)?)
}

pub fn styled_status(status: JobStatus) -> String {
    let name = status.name();
    match status {
        JobStatus::Completed => style(name).green().bold().to_string(),
        JobStatus::FallbackClassicalCompleted => style(name).yellow().bold().to_string(),
        JobStatus::Failed | JobStatus::FallbackClassicalFailed => {
            style(name).red().bold().to_string()
        }
        _ => style(name).dim().to_string(),
    }
}

/// Print a finished job as a human-readable report.
pub fn print_job(job: &Job, params: &FloodParameters) {
    let marker = if job.status.is_success() {
        style("✓").green().bold()
    } else {
        style("✗").red().bold()
    };
    println!(
        "\n{} Job {} {} ({}, seed {})",
        marker,
        style(job.id).dim(),
        styled_status(job.status),
        job.solver_type,
        job.seed
    );

    if let Some(reason) = &job.fallback_reason {
        println!("  Fallback: {}", style(reason).yellow());
    }

    println!("\n  Attempts:");
    for (i, attempt) in job.attempts.iter().enumerate() {
        let status = match attempt.status {
            AttemptStatus::Succeeded => style("succeeded").green(),
            AttemptStatus::Failed => style("failed").red(),
            AttemptStatus::Discarded => style("discarded").dim(),
        };
        let detail = match (&attempt.error, attempt.method) {
            (Some(err), _) => err.to_string(),
            (None, SolveMethod::Classical) => format!(
                "residual {:.3e}",
                attempt.diagnostics.residual.unwrap_or(f64::NAN)
            ),
            (None, SolveMethod::Quantum) => {
                let d = &attempt.diagnostics;
                format!(
                    "ancilla {}/{} shots, error estimate {}",
                    d.ancilla_success_counts.unwrap_or(0),
                    d.shots.unwrap_or(0),
                    d.error_estimate
                        .map(|e| format!("{e:.3e}"))
                        .unwrap_or_else(|| "n/a".to_string())
                )
            }
        };
        println!(
            "    {}. {:<9} {:<9} {:>8.4}s  {}",
            i + 1,
            attempt.method,
            status,
            attempt.diagnostics.solve_time,
            detail
        );
    }

    if let Some(solution) = job.final_solution().and_then(|a| a.solution.as_deref()) {
        let summary = params.depth_summary(solution);
        println!("\n  Flood summary:");
        println!(
            "    Max depth:     {} m",
            style(format!("{:.4}", summary.max_depth)).cyan()
        );
        println!("    Mean depth:    {:.4} m", summary.mean_depth);
        println!(
            "    Flooded cells: {}/{} (threshold {} m)",
            style(summary.flooded_cells).yellow(),
            summary.total_cells,
            params.flood_threshold
        );
    }

    if !job.artifacts.is_empty() {
        println!("\n  Artifacts:");
        for (name, uri) in &job.artifacts {
            println!("    {:<20} {}", name, style(uri).dim());
        }
    }
}

/// Machine-readable job report.
pub fn job_report(job: &Job, params: &FloodParameters) -> serde_json::Value {
    let summary = job
        .final_solution()
        .and_then(|a| a.solution.as_deref())
        .map(|x| params.depth_summary(x));
    serde_json::json!({
        "job_id": job.id,
        "solver_type": job.solver_type,
        "seed": job.seed,
        "status": job.status,
        "fallback_reason": job.fallback_reason,
        "history": job.history,
        "attempts": job.attempts,
        "artifacts": job.artifacts,
        "flood_summary": summary,
    })
}
