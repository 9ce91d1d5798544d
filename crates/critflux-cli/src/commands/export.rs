//! Export a JSON snapshot for display consumers.

use anyhow::{Context, Result};
use colored::Colorize;
use critflux::prelude::*;
use critflux::runtime::export::to_json;
use std::path::Path;

use super::SimArgs;
use crate::config::Config;

pub fn run(output: &str, sim_args: &SimArgs, steps: u64, compact: bool) -> Result<()> {
    let config = Config::load()?;
    let mesh = sim_args.build_mesh(&config)?;
    let params = sim_args.params(&config)?;
    let mut sim = Simulation::new(mesh, params, sim_args.seed(&config))?;

    if steps > 0 {
        println!("{} Running {} steps...", "→".blue(), steps.to_string().cyan());
        sim.run(steps);
    }

    let snapshot = sim.snapshot();
    let content = to_json(&snapshot, !compact).context("Failed to serialize snapshot")?;
    let output_path = Path::new(output);
    std::fs::write(output_path, content)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!();
    println!("{} Exported to {}", "✓".green().bold(), output.cyan());
    println!("  Nodes: {}", snapshot.positions.len().to_string().cyan());
    println!("  Faces: {}", snapshot.faces.len().to_string().cyan());
    println!("  Time:  {:.1}", snapshot.time);

    Ok(())
}
