//! Solve command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use qflood_linalg::grid::{
    DEFAULT_CONVERSION_FACTOR, DEFAULT_FLOOD_THRESHOLD, DEFAULT_SOURCE_VALUE,
};
use qflood_linalg::{FloodParameters, LinearSystem, SubmatrixStrategy};
use qflood_sched::{ArtifactBackend, HybridOrchestrator, SolverConfig, SolverType};
use tracing::debug;

use super::common::{job_report, load_config, load_system, print_job};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct SolveArgs {
    /// Cells per side of the flood grid
    #[arg(short, long, default_value = "50")]
    pub grid: usize,

    /// Solver path: classical, quantum or hybrid
    #[arg(short, long, default_value = "hybrid")]
    pub solver: SolverType,

    /// Sampling seed (derived from the job id when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write artifacts under this directory instead of keeping them in memory
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Matrix artifact (JSON, CSR) to solve instead of a generated grid
    #[arg(long, requires = "vector")]
    pub matrix: Option<PathBuf>,

    /// Right-hand side artifact (JSON vector)
    #[arg(long, requires = "matrix")]
    pub vector: Option<PathBuf>,

    /// Source value placed in every entry of b
    #[arg(long, default_value_t = DEFAULT_SOURCE_VALUE)]
    pub source: f64,

    /// Factor turning a solution value into a depth in metres
    #[arg(long, default_value_t = DEFAULT_CONVERSION_FACTOR)]
    pub conversion_factor: f64,

    /// Depth above which a cell counts as flooded
    #[arg(long, default_value_t = DEFAULT_FLOOD_THRESHOLD)]
    pub flood_threshold: f64,

    /// Number of measurement shots for the quantum attempt
    #[arg(long)]
    pub shots: Option<u32>,

    /// Size of the subsystem handed to the quantum solver
    #[arg(long)]
    pub subsystem_dim: Option<usize>,

    /// Subsystem selection: leading_block or dominant_diagonal
    #[arg(long)]
    pub strategy: Option<SubmatrixStrategy>,

    /// Give up waiting after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl SolveArgs {
    fn flood_parameters(&self) -> FloodParameters {
        FloodParameters {
            grid_resolution: self.grid,
            source_value: self.source,
            conversion_factor: self.conversion_factor,
            flood_threshold: self.flood_threshold,
        }
    }

    /// Command-line options override the file and environment.
    fn apply_overrides(&self, config: &mut SolverConfig) {
        if let Some(shots) = self.shots {
            config.quantum.shots = shots;
        }
        if let Some(k) = self.subsystem_dim {
            config.prepare.subsystem_dim = k;
        }
        if let Some(strategy) = self.strategy {
            config.prepare.strategy = strategy;
        }
        if let Some(dir) = &self.artifacts {
            config.artifacts.backend = ArtifactBackend::Filesystem;
            config.artifacts.root = Some(dir.clone());
        }
    }
}

/// Execute the solve command.
pub async fn execute(args: SolveArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;
    debug!(?config, "effective configuration");

    let params = args.flood_parameters();
    let system = match (&args.matrix, &args.vector) {
        (Some(matrix), Some(vector)) => load_system(matrix, vector)?,
        _ => LinearSystem::from_grid(&params)?,
    };
    let table = args.format == OutputFormat::Table;

    if table {
        println!(
            "{} Solving {} unknowns with the {} solver",
            style("→").cyan().bold(),
            style(system.dim()).green(),
            style(args.solver).yellow()
        );
    }

    let orchestrator = HybridOrchestrator::new(&config)?;
    let id = orchestrator
        .submit_with_seed(system, args.solver, args.seed)
        .await?;

    let pb = if table {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")?,
        );
        pb.set_message(format!("Job {id} running..."));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let job = orchestrator
        .wait(&id, args.timeout.map(Duration::from_secs))
        .await;
    pb.finish_and_clear();
    let job = job?;

    match args.format {
        OutputFormat::Table => print_job(&job, &params),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&job_report(&job, &params))?);
        }
    }

    if !job.status.is_success() {
        bail!("job {} finished with status {}", job.id, job.status.name());
    }
    Ok(())
}
