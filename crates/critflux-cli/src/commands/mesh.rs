//! Describe the graph a topology builds.

use anyhow::Result;
use colored::Colorize;
use critflux::prelude::*;

use super::SimArgs;
use crate::config::Config;

pub fn run(sim_args: &SimArgs) -> Result<()> {
    let config = Config::load()?;
    let topology = sim_args.topology(&config)?;
    let mesh = sim_args.build_mesh(&config)?;
    let params = sim_args.params(&config)?;
    let degrees = mesh.degree_stats();
    let components = mesh.component_count();

    println!("{}", "Mesh".white().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();

    println!("{}", "Topology".blue().bold());
    println!("  Kind:              {}", mesh.kind.to_string().cyan());
    println!("  Request:           {:?}", topology);
    if let Some(grid) = mesh.grid {
        println!(
            "  Grid:              {} × {} ({:?} wrap)",
            grid.height, grid.width, grid.wrap
        );
    }
    println!();

    println!("{}", "Graph".blue().bold());
    println!("  Nodes:             {}", mesh.len().to_string().cyan());
    println!("  Edges:             {}", mesh.edge_count().to_string().cyan());
    println!("  Faces:             {}", mesh.faces.len());
    if !mesh.polygons.is_empty() {
        println!("  Cells:             {}", mesh.polygons.len());
    }
    println!(
        "  Degree:            min {} / mean {:.2} / max {}",
        degrees.min, degrees.mean, degrees.max
    );
    let connected = if components == 1 {
        "connected".green()
    } else {
        format!("{components} components").red()
    };
    println!("  Components:        {}", connected);
    println!();

    println!("{}", "Stability".blue().bold());
    let estimate = params.stability_estimate(degrees.max);
    let verdict = if estimate <= 1.0 {
        "stable".green()
    } else {
        "may oscillate".yellow()
    };
    println!(
        "  dt·k·deg ({}):  {:.3} ({})",
        params.variant, estimate, verdict
    );

    println!();
    println!("{}", "═".repeat(40).dimmed());

    Ok(())
}
