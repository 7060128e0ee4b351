//! qflood Command-Line Interface
//!
//! Assemble a flood-grid linear system, solve it with the classical,
//! quantum or hybrid path, and report the job outcome.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

mod commands;
mod logging;

use commands::{config, grid, solve, version};
use logging::LogFormat;

/// qflood - hybrid quantum/classical solver for flood-grid linear systems
#[derive(Parser)]
#[command(name = "qflood")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Console, env = "QFLOOD_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a flood grid (or a stored system) and print the job outcome
    Solve(solve::SolveArgs),

    /// Write the grid system's matrix and right-hand side as JSON artifacts
    Grid {
        /// Cells per side
        #[arg(short, long, default_value = "50")]
        grid: usize,

        /// Source value placed in every entry of b
        #[arg(long, default_value = "0.1")]
        source: f64,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the effective solver configuration
    Config {
        /// Configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.log_format);

    // Execute command
    let result = match cli.command {
        Commands::Solve(args) => solve::execute(args).await,

        Commands::Grid {
            grid: resolution,
            source,
            output,
        } => grid::execute(resolution, source, &output),

        Commands::Config { config: path } => config::execute(path.as_deref()),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
