//! Measure the avalanche size distribution.

use anyhow::Result;
use critflux::prelude::*;

use super::SimArgs;
use crate::config::Config;

pub fn run(
    sim_args: &SimArgs,
    warmup: Option<u64>,
    measure: Option<u64>,
    quiet: Option<f64>,
    plot: bool,
) -> Result<()> {
    let config = Config::load()?;
    let analysis = &config.analysis;
    let mesh = sim_args.build_mesh(&config)?;
    let base = Params::for_variant(sim_args.variant(&config));
    let mut sim = Simulation::new(mesh, base, sim_args.seed(&config))?;

    let source = match &sim_args.preset {
        Some(name) => ParamSource::Preset(name.clone()),
        None => ParamSource::Phase(sim_args.phase.unwrap_or(analysis.avalanche_phase)),
    };
    let run_config = AvalancheConfig::new(
        warmup.unwrap_or(analysis.avalanche_warmup),
        measure.unwrap_or(analysis.avalanche_measure),
    )
    .with_source(source)
    .with_quiet_period(quiet.unwrap_or(analysis.quiet_period))
    .with_overrides(sim_args.overrides(&config))
    .with_presets(config.user_presets())
    .with_seed(sim_args.seed(&config));

    let report = run_avalanche(&mut sim, &run_config)?;
    print!("{}", report.to_table());
    if plot {
        print!("{}", report.plot(48, 12));
    }

    Ok(())
}
