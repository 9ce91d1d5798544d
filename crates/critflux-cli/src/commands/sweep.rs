//! Sweep presets and phases over a lattice.

use anyhow::Result;
use colored::Colorize;
use critflux::prelude::*;

use super::SimArgs;
use crate::config::Config;

pub fn run(
    sim_args: &SimArgs,
    warmup: Option<u64>,
    measure: Option<u64>,
    step: Option<f64>,
    mode: SweepMode,
    table: bool,
) -> Result<()> {
    let config = Config::load()?;
    let analysis = &config.analysis;
    let mesh = sim_args.build_mesh(&config)?;
    let base = Params::for_variant(sim_args.variant(&config));

    let sweep_config = SweepConfig::new(
        warmup.unwrap_or(analysis.sweep_warmup),
        measure.unwrap_or(analysis.sweep_measure),
    )
    .with_mode(mode)
    .with_phase_step(step.unwrap_or(analysis.phase_step))
    .with_presets(config.all_presets())
    .with_overrides(sim_args.overrides(&config))
    .with_seed(sim_args.seed(&config));

    let rows = run_sweep(mesh, &base, &sweep_config)?;

    if table {
        print_table(&rows);
    } else {
        print!("{}", sweep_csv(&rows));
    }
    Ok(())
}

fn print_table(rows: &[SweepRow]) {
    println!("┌────────┬──────────────────────┬────────────┬──────────┐");
    println!(
        "│ {:<6} │ {:<20} │ {:>10} │ {:<8} │",
        "Mode", "Id", "Corr. len", "Regime"
    );
    println!("├────────┼──────────────────────┼────────────┼──────────┤");
    for row in rows {
        let regime = match row.regime {
            Regime::Pattern => format!("{:<8}", row.regime).green(),
            Regime::None => format!("{:<8}", row.regime).dimmed(),
        };
        println!(
            "│ {:<6} │ {:<20} │ {:>10.3} │ {} │",
            row.mode, row.id, row.correlation_length, regime
        );
    }
    println!("└────────┴──────────────────────┴────────────┴──────────┘");
}
