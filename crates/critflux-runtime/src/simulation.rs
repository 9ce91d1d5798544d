//! Simulation - an owned engine context.
//!
//! A simulation bundles a shared, immutable mesh with its own parameters,
//! field state and collapse random source. Independent simulations may
//! share one `Arc<Mesh>` across threads; nothing mutable is shared.
//!
//! Each tick:
//! 1. The step engine advances the field at the current time
//! 2. Time advances by `dt` and the step counter increments
//! 3. The step report is folded into the running totals

use crate::engine::{self, Forcing, StepReport};
use crate::metrics::FieldSummary;
use critflux_core::error::Result;
use critflux_core::graph::AdjacencyGraph;
use critflux_core::params::Params;
use critflux_core::state::FieldState;
use critflux_core::topology::{Mesh, Topology};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mixed into the seed for the collapse stream so it never replays the
/// draws that initialized the energy field.
const COLLAPSE_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Configuration for building a simulation from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub topology: Topology,
    pub params: Params,
    /// Seed for the initial field and the collapse stream (default: 1).
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            topology: Topology::from_resolution(critflux_core::topology::TopologyKind::Lattice, 4),
            params: Params::default(),
            seed: 1,
        }
    }
}

/// Running totals since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTotals {
    pub steps: u64,
    pub drive: f64,
    pub dissipation: f64,
    pub collapses: u64,
    pub released: f64,
}

impl RunTotals {
    fn record(&mut self, report: &StepReport) {
        self.steps += 1;
        self.drive += report.drive;
        self.dissipation += report.dissipation;
        self.collapses += report.collapse_count as u64;
        self.released += report.release_sum;
    }
}

/// Mutable views of the three fields, one value per node.
#[derive(Debug)]
pub struct FieldsMut<'a> {
    pub energy: &'a mut [f64],
    pub info: &'a mut [f64],
    pub structure: &'a mut [f64],
}

/// The simulation context.
#[derive(Debug, Clone)]
pub struct Simulation {
    mesh: Arc<Mesh>,
    params: Params,
    state: FieldState,
    rng: SmallRng,
    totals: RunTotals,
    last_report: StepReport,
}

impl Simulation {
    /// Assemble a simulation over `mesh`, validating the mesh, parameters
    /// and state shapes once. Ticks cannot fail afterwards.
    pub fn new(mesh: Arc<Mesh>, params: Params, seed: u64) -> Result<Self> {
        mesh.validate()?;
        params.validate()?;
        let state = FieldState::new(mesh.len(), seed)?;
        engine::check_shapes(&state, mesh.as_ref(), &Forcing::from_mesh(&mesh))?;
        warn_if_unstable(&params, &mesh);
        debug!(
            kind = %mesh.kind,
            nodes = mesh.len(),
            variant = %params.variant,
            seed,
            "simulation assembled"
        );
        Ok(Self {
            mesh,
            params,
            state,
            rng: collapse_rng(seed),
            totals: RunTotals::default(),
            last_report: StepReport::default(),
        })
    }

    /// Build the topology and assemble a simulation over it.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let mesh = Arc::new(config.topology.build()?);
        Self::new(mesh, config.params.clone(), config.seed)
    }

    /// Advance one step.
    pub fn tick(&mut self) -> StepReport {
        let t = self.state.time;
        let report = engine::step_unchecked(
            &mut self.state,
            &self.params,
            self.mesh.as_ref(),
            Forcing::from_mesh(&self.mesh),
            t,
            &mut self.rng,
        );
        self.state.time += self.params.dt;
        self.totals.record(&report);
        self.last_report = report;
        report
    }

    /// Advance `steps` steps, returning their combined report.
    pub fn run(&mut self, steps: u64) -> StepReport {
        let mut combined = StepReport::default();
        for _ in 0..steps {
            let report = self.tick();
            combined.accumulate(&report);
        }
        combined
    }

    /// Reinitialize the field and the collapse stream from `seed`.
    /// Deterministic and idempotent for a fixed seed.
    pub fn reset(&mut self, seed: u64) {
        self.state.reset(seed);
        self.rng = collapse_rng(seed);
        self.totals = RunTotals::default();
        self.last_report = StepReport::default();
    }

    /// Replace the parameter set between steps.
    pub fn set_params(&mut self, params: Params) -> Result<()> {
        params.validate()?;
        warn_if_unstable(&params, &self.mesh);
        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The shared mesh handle, for building sibling simulations.
    pub fn mesh_arc(&self) -> Arc<Mesh> {
        Arc::clone(&self.mesh)
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    /// Per-node field values for scenario setup. The slices are fixed in
    /// length, so the field always matches the mesh.
    pub fn fields_mut(&mut self) -> FieldsMut<'_> {
        FieldsMut {
            energy: &mut self.state.energy,
            info: &mut self.state.info,
            structure: &mut self.state.structure,
        }
    }

    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn seed(&self) -> u64 {
        self.state.seed
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }

    pub fn last_report(&self) -> StepReport {
        self.last_report
    }

    /// Mean field values and total energy.
    pub fn summary(&self) -> FieldSummary {
        FieldSummary::of(&self.state)
    }
}

fn collapse_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ COLLAPSE_STREAM)
}

fn warn_if_unstable(params: &Params, mesh: &Mesh) {
    let estimate = params.stability_estimate(mesh.max_degree());
    if estimate > 1.0 {
        warn!(
            estimate,
            diffusion = params.diffusion,
            dt = params.dt,
            "diffusion exceeds the explicit-Euler stability estimate; energy may oscillate"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critflux_core::topology::Wrap;

    fn small() -> Simulation {
        let config = SimulationConfig {
            topology: Topology::Lattice {
                height: 16,
                width: 20,
                wrap: Wrap::Both,
            },
            params: Params::from_phase(critflux_core::params::EngineVariant::Accounted, 0.7),
            seed: 1,
        };
        Simulation::from_config(&config).unwrap()
    }

    #[test]
    fn tick_advances_time_and_totals() {
        let mut sim = small();
        sim.run(10);
        assert_eq!(sim.totals().steps, 10);
        assert!((sim.time() - 10.0 * sim.params().dt).abs() < 1e-12);
    }

    #[test]
    fn reset_restores_the_initial_state() {
        let mut sim = small();
        let initial = sim.state().clone();
        sim.run(25);
        sim.reset(1);
        assert_eq!(sim.state(), &initial);
        assert_eq!(sim.totals(), RunTotals::default());
    }

    #[test]
    fn rejects_invalid_params() {
        let mut sim = small();
        let mut params = sim.params().clone();
        params.diffusion = -1.0;
        assert!(sim.set_params(params).is_err());
    }

    #[test]
    fn field_edits_keep_the_mesh_shape() {
        let mut sim = small();
        let n = sim.mesh().len();
        {
            let fields = sim.fields_mut();
            assert_eq!(fields.energy.len(), n);
            fields.energy.fill(0.5);
            fields.info[3] = 0.2;
            fields.structure[4] = 0.9;
        }
        assert_eq!(sim.state().info[3], 0.2);
        assert_eq!(sim.state().structure[4], 0.9);
        sim.run(5);
        assert_eq!(sim.state().energy.len(), n);
        sim.state().check_len(n).unwrap();
    }

    #[test]
    fn default_config_builds() {
        let sim = Simulation::from_config(&SimulationConfig::default()).unwrap();
        assert_eq!(sim.mesh().len(), 130 * 180);
    }
}
