//! Critflux CLI - command-line driver for criticality experiments.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::SimArgs;
use critflux::runtime::batch::SweepMode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "critflux")]
#[command(author, version, about = "Critflux - self-organized criticality on lattices and sphere meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default critflux.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run a simulation and report field and structure metrics
    Run {
        #[command(flatten)]
        sim: SimArgs,

        /// Number of steps to run
        #[arg(short, long, default_value = "500")]
        steps: u64,
    },

    /// Measure the avalanche size distribution
    Avalanche {
        #[command(flatten)]
        sim: SimArgs,

        /// Steps discarded before measuring
        #[arg(long)]
        warmup: Option<u64>,

        /// Steps measured
        #[arg(long)]
        measure: Option<u64>,

        /// Quiet steps that close an avalanche
        #[arg(long)]
        quiet: Option<f64>,

        /// Print an ASCII log-log plot
        #[arg(long)]
        plot: bool,
    },

    /// Sweep presets and phases, reporting correlation length
    Sweep {
        #[command(flatten)]
        sim: SimArgs,

        /// Steps discarded before measuring
        #[arg(long)]
        warmup: Option<u64>,

        /// Steps measured
        #[arg(long)]
        measure: Option<u64>,

        /// Phase increment
        #[arg(long)]
        step: Option<f64>,

        /// Rows to run: presets, phase or both
        #[arg(long, default_value = "both")]
        mode: SweepMode,

        /// Print a formatted table instead of CSV
        #[arg(long)]
        table: bool,
    },

    /// Describe the graph a topology builds
    Mesh {
        #[command(flatten)]
        sim: SimArgs,
    },

    /// Run a simulation and export a JSON snapshot
    Export {
        /// Output file path
        output: String,

        #[command(flatten)]
        sim: SimArgs,

        /// Number of steps to run before the snapshot
        #[arg(short, long, default_value = "0")]
        steps: u64,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// List parameters with their ranges and resolved values
    Params {
        #[command(flatten)]
        sim: SimArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { path, force } => commands::init::run(path, force),
        Commands::Run { sim, steps } => commands::run::run(&sim, steps, cli.verbose),
        Commands::Avalanche {
            sim,
            warmup,
            measure,
            quiet,
            plot,
        } => commands::avalanche::run(&sim, warmup, measure, quiet, plot),
        Commands::Sweep {
            sim,
            warmup,
            measure,
            step,
            mode,
            table,
        } => commands::sweep::run(&sim, warmup, measure, step, mode, table),
        Commands::Mesh { sim } => commands::mesh::run(&sim),
        Commands::Export {
            output,
            sim,
            steps,
            compact,
        } => commands::export::run(&output, &sim, steps, compact),
        Commands::Params { sim } => commands::params::run(&sim),
    }
}
