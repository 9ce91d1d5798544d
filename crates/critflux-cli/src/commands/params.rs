//! List parameters with their ranges and resolved values.

use anyhow::Result;
use colored::Colorize;
use critflux::prelude::*;

use super::SimArgs;
use crate::config::Config;

pub fn run(sim_args: &SimArgs) -> Result<()> {
    let config = Config::load()?;
    let params = sim_args.params(&config)?;

    println!(
        "{} ({} variant)",
        "Parameters".white().bold(),
        params.variant.to_string().cyan()
    );
    println!("{}", "═".repeat(72).dimmed());
    for spec in PARAMS {
        let value = params.get(spec.name)?;
        println!(
            "  {:<18} {:>10.4}  [{}, {}]  {}",
            spec.name,
            value,
            spec.min,
            spec.max,
            spec.doc.dimmed()
        );
    }
    println!();

    println!("{}", "Presets".white().bold());
    println!("{}", "═".repeat(72).dimmed());
    for preset in config.all_presets() {
        let variant = preset
            .variant
            .map_or_else(|| "any".to_string(), |v| v.to_string());
        println!(
            "  {:<18} {:<10} {} overrides",
            preset.name.cyan(),
            variant,
            preset.overrides.len()
        );
    }

    Ok(())
}
