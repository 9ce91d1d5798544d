//! CLI command implementations.

pub mod avalanche;
pub mod export;
pub mod init;
pub mod mesh;
pub mod params;
pub mod run;
pub mod sweep;

use anyhow::{Context, Result};
use clap::Args;
use critflux::prelude::*;
use std::sync::Arc;

use crate::config::Config;

/// Simulation options shared by every command that builds one. Unset
/// options fall back to critflux.toml, then to built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct SimArgs {
    /// Topology: lattice, icosphere, hex-sphere, fibonacci, lat-lon-grid or torus
    #[arg(short = 'k', long)]
    pub topology: Option<TopologyKind>,

    /// Topology resolution
    #[arg(short, long)]
    pub resolution: Option<usize>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Engine variant: accounted or relaxed
    #[arg(long)]
    pub variant: Option<EngineVariant>,

    /// Phase in [0, 1] projected onto the parameters
    #[arg(long)]
    pub phase: Option<f64>,

    /// Named preset applied after the phase
    #[arg(long)]
    pub preset: Option<String>,

    /// Parameter override, applied last (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, f64)>,
}

impl SimArgs {
    pub fn seed(&self, config: &Config) -> u64 {
        self.seed.unwrap_or(config.simulation.seed)
    }

    pub fn variant(&self, config: &Config) -> EngineVariant {
        self.variant.unwrap_or(config.simulation.variant)
    }

    pub fn topology(&self, config: &Config) -> Result<Topology> {
        let kind = match self.topology {
            Some(kind) => kind,
            None => config.simulation.topology.parse()?,
        };
        let resolution = self.resolution.unwrap_or(config.simulation.resolution);
        Ok(Topology::from_resolution(kind, resolution))
    }

    pub fn build_mesh(&self, config: &Config) -> Result<Arc<Mesh>> {
        let topology = self.topology(config)?;
        let mesh = topology
            .build()
            .with_context(|| format!("Failed to build {}", topology.kind()))?;
        Ok(Arc::new(mesh))
    }

    /// `[params]` entries followed by `--set` pairs.
    pub fn overrides(&self, config: &Config) -> Vec<(String, f64)> {
        let mut overrides = config.overrides();
        overrides.extend(self.set.iter().cloned());
        overrides
    }

    /// Variant defaults, then phase, then preset, then direct overrides.
    pub fn params(&self, config: &Config) -> Result<Params> {
        let mut params = Params::for_variant(self.variant(config));
        if let Some(phase) = self.phase.or(config.simulation.phase) {
            params.apply_phase(phase);
        }
        if let Some(name) = &self.preset {
            Preset::find(name, &config.user_presets())?.apply(&mut params)?;
        }
        let overrides = self.overrides(config);
        params.apply_overrides(overrides.iter().map(|(k, v)| (k.as_str(), *v)))?;
        params.validate()?;
        Ok(params)
    }
}

fn parse_assignment(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for {}: {e}", name.trim()))?;
    Ok((name.trim().to_string(), value))
}
