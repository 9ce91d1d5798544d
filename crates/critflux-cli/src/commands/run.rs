//! Run a simulation and report what it did.

use anyhow::Result;
use colored::Colorize;
use critflux::prelude::*;
use critflux::runtime::metrics::DEFAULT_CLUSTER_THRESHOLD;
use indicatif::{ProgressBar, ProgressStyle};

use super::SimArgs;
use crate::config::Config;

pub fn run(sim_args: &SimArgs, steps: u64, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let mesh = sim_args.build_mesh(&config)?;
    let params = sim_args.params(&config)?;
    let mut sim = Simulation::new(mesh, params, sim_args.seed(&config))?;

    println!(
        "{} {} with {} nodes, {} variant",
        "→".blue(),
        sim.mesh().kind.to_string().cyan(),
        sim.mesh().len().to_string().cyan(),
        sim.params().variant.to_string().cyan()
    );

    let initial = sim.summary();

    let pb = ProgressBar::new(steps);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} steps")?
            .progress_chars("#>-"),
    );

    for _ in 0..steps {
        let report = sim.tick();
        if verbose && report.collapse_count > 0 {
            pb.println(format!(
                "  t={:.1}: {} collapses, {:.4} released",
                sim.time(),
                report.collapse_count,
                report.release_sum
            ));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let totals = sim.totals();
    let summary = sim.summary();
    let structure = structure_metrics(
        &sim.state().structure,
        sim.mesh(),
        DEFAULT_CLUSTER_THRESHOLD,
    )?;

    println!();
    println!("{} Simulation complete!", "✓".green().bold());
    println!();
    println!("{}", "Fields".blue().bold());
    println!(
        "  Mean energy:       {:.4} → {:.4}",
        initial.mean_energy, summary.mean_energy
    );
    println!("  Mean information:  {:.4}", summary.mean_info);
    println!("  Mean structure:    {:.4}", summary.mean_structure);
    println!();
    println!("{}", "Energy Budget".blue().bold());
    println!("  Driven in:         {:.4}", totals.drive);
    println!("  Dissipated:        {:.4}", totals.dissipation);
    println!(
        "  Collapses:         {} ({:.4} released)",
        totals.collapses.to_string().cyan(),
        totals.released
    );
    println!();
    println!("{}", "Structure".blue().bold());
    println!("  Moran's I:         {:.3}", structure.moran_i);
    println!(
        "  Clusters:          {} (mean {:.1}, max {})",
        structure.clusters.count.to_string().cyan(),
        structure.clusters.mean_size,
        structure.clusters.max_size
    );
    if let Some(grid) = sim.mesh().grid {
        let xi = correlation_length(&sim.state().structure, grid)?;
        println!(
            "  Correlation:       {:.3} ({})",
            xi,
            Regime::classify(xi).to_string().yellow()
        );
    }

    Ok(())
}
