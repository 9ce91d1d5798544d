//! Batch analysis drivers: avalanche statistics and correlation sweeps.
//!
//! Both drivers follow the same shape: resolve a parameter set, reset the
//! field, discard `warmup` steps, then measure for `measure` steps.
//! Sweeps run their rows in parallel over one shared mesh; each row owns
//! its own field, parameters and random source.

use crate::avalanche::{ascii_plot, AvalancheAnalysis, AvalancheDetector, DEFAULT_QUIET_PERIOD};
use crate::metrics::{correlation_length, Regime};
use crate::simulation::Simulation;
use critflux_core::error::{CritfluxError, Result};
use critflux_core::params::Params;
use critflux_core::presets::Preset;
use critflux_core::topology::Mesh;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span};

/// Where a run's parameters come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSource {
    /// Phase projection applied on top of the base parameters.
    Phase(f64),
    /// A named preset applied on top of the base parameters.
    Preset(String),
    /// Use these parameters as given.
    Explicit(Params),
}

impl ParamSource {
    /// Resolve against `base`, looking presets up in `presets` before the
    /// built-ins.
    pub fn resolve(&self, base: &Params, presets: &[Preset]) -> Result<Params> {
        match self {
            ParamSource::Phase(phase) => {
                let mut params = base.clone();
                params.apply_phase(*phase);
                Ok(params)
            }
            ParamSource::Preset(name) => {
                let mut params = base.clone();
                Preset::find(name, presets)?.apply(&mut params)?;
                Ok(params)
            }
            ParamSource::Explicit(params) => Ok(params.clone()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ParamSource::Phase(phase) => format!("phase {phase:.2}"),
            ParamSource::Preset(name) => format!("preset {name}"),
            ParamSource::Explicit(params) => format!("explicit ({})", params.variant),
        }
    }
}

/// Configuration for an avalanche run.
#[derive(Debug, Clone)]
pub struct AvalancheConfig {
    pub warmup: u64,
    pub measure: u64,
    pub quiet_period: f64,
    pub source: ParamSource,
    /// Direct overrides applied after the source.
    pub overrides: Vec<(String, f64)>,
    /// User presets consulted before the built-ins.
    pub presets: Vec<Preset>,
    pub seed: u64,
}

impl Default for AvalancheConfig {
    fn default() -> Self {
        Self {
            warmup: 1000,
            measure: 4000,
            quiet_period: DEFAULT_QUIET_PERIOD,
            source: ParamSource::Phase(0.70),
            overrides: Vec::new(),
            presets: Vec::new(),
            seed: 1,
        }
    }
}

impl AvalancheConfig {
    pub fn new(warmup: u64, measure: u64) -> Self {
        Self {
            warmup,
            measure,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: ParamSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_quiet_period(mut self, quiet_period: f64) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn with_overrides(mut self, overrides: Vec<(String, f64)>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Result of an avalanche run.
#[derive(Debug, Clone, Serialize)]
pub struct AvalancheReport {
    pub label: String,
    pub cells: usize,
    pub warmup: u64,
    pub measure: u64,
    pub analysis: AvalancheAnalysis,
    pub wall_time_ms: u64,
}

impl AvalancheReport {
    /// The tabular text form: exponent, counts, log-log points and, with
    /// enough avalanches, the max/median heuristic.
    pub fn to_table(&self) -> String {
        let a = &self.analysis;
        let mut out = String::new();
        let tau = a.tau.map_or_else(|| "n/a".to_string(), |tau| format!("{tau:.3}"));
        writeln!(out, "tau,{tau}").ok();
        writeln!(out, "totalAvalanches,{}", a.total_avalanches).ok();
        writeln!(out, "avgSize,{:.3}", a.avg_size).ok();
        out.push_str("logS,logP\n");
        for (log_s, log_p) in &a.log_points {
            writeln!(out, "{log_s:.4},{log_p:.4}").ok();
        }
        if a.has_enough_data() {
            writeln!(out, "Max/median ratio: {:.1}", a.max_median_ratio).ok();
            out.push_str("(SOC typically > 100, ordered < 10)\n");
            writeln!(out, "Largest event: {} collapses", a.max_size).ok();
            writeln!(out, "(SOC: largest ~ total cells: {})", self.cells).ok();
        } else {
            out.push_str("Need more data\n");
        }
        out
    }

    /// Log-log scatter of the size distribution.
    pub fn plot(&self, width: usize, height: usize) -> String {
        ascii_plot(&self.analysis.log_points, width, height)
    }
}

/// Resolve parameters, reset, warm up and record avalanches.
///
/// The detector clock is the measurement step index, so the quiet period
/// counts steps regardless of `dt`.
pub fn run_avalanche(sim: &mut Simulation, config: &AvalancheConfig) -> Result<AvalancheReport> {
    let mut params = config.source.resolve(sim.params(), &config.presets)?;
    apply_overrides(&mut params, &config.overrides)?;
    sim.set_params(params)?;
    sim.reset(config.seed);

    let label = config.source.label();
    debug!(
        %label,
        warmup = config.warmup,
        measure = config.measure,
        nodes = sim.mesh().len(),
        "avalanche run"
    );

    let start = Instant::now();
    sim.run(config.warmup);
    let mut detector = AvalancheDetector::new(config.quiet_period);
    for step in 0..config.measure {
        let report = sim.tick();
        detector.record(step as f64, report.collapse_count, report.release_sum);
    }
    let analysis = detector.analyze();
    let wall_time_ms = start.elapsed().as_millis() as u64;

    debug!(
        avalanches = analysis.total_avalanches,
        wall_time_ms, "avalanche run finished"
    );

    Ok(AvalancheReport {
        label,
        cells: sim.mesh().len(),
        warmup: config.warmup,
        measure: config.measure,
        analysis,
        wall_time_ms,
    })
}

/// Which rows a sweep produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    Presets,
    Phase,
    #[default]
    Both,
}

impl SweepMode {
    fn runs_presets(self) -> bool {
        matches!(self, SweepMode::Presets | SweepMode::Both)
    }

    fn runs_phases(self) -> bool {
        matches!(self, SweepMode::Phase | SweepMode::Both)
    }
}

impl FromStr for SweepMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "presets" | "preset" => Ok(SweepMode::Presets),
            "phase" | "phases" => Ok(SweepMode::Phase),
            "both" => Ok(SweepMode::Both),
            other => Err(format!("unknown sweep mode: {other} (expected presets, phase or both)")),
        }
    }
}

/// Configuration for a correlation-length sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub warmup: u64,
    pub measure: u64,
    pub phase_step: f64,
    pub mode: SweepMode,
    /// Presets swept in preset mode, in row order.
    pub presets: Vec<Preset>,
    /// Direct overrides applied to every row after its preset or phase.
    pub overrides: Vec<(String, f64)>,
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            warmup: 300,
            measure: 800,
            phase_step: 0.02,
            mode: SweepMode::Both,
            presets: Preset::builtin(),
            overrides: Vec::new(),
            seed: 1,
        }
    }
}

impl SweepConfig {
    pub fn new(warmup: u64, measure: u64) -> Self {
        Self {
            warmup,
            measure,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: SweepMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_phase_step(mut self, step: f64) -> Self {
        self.phase_step = step;
        self
    }

    pub fn with_presets(mut self, presets: Vec<Preset>) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_overrides(mut self, overrides: Vec<(String, f64)>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Phases visited in phase mode: `0, step, 2·step, …` up to 1.
    pub fn phases(&self) -> Result<Vec<f64>> {
        if !(self.phase_step > 0.0 && self.phase_step <= 1.0) {
            return Err(CritfluxError::out_of_range(
                "phase_step",
                f64::MIN_POSITIVE,
                1.0,
                self.phase_step,
            ));
        }
        Ok((0u32..)
            .map(|k| k as f64 * self.phase_step)
            .take_while(|&p| p <= 1.0001)
            .collect())
    }
}

/// One sweep result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    /// `"preset"` or `"phase"`.
    pub mode: &'static str,
    pub id: String,
    pub correlation_length: f64,
    pub regime: Regime,
}

struct SweepJob {
    mode: &'static str,
    id: String,
    params: Params,
}

/// Run every row of the sweep over `mesh`, in parallel.
///
/// Rows come back in input order: presets first, then phases ascending.
/// The mesh must be a lattice; anything else is rejected before any row
/// runs.
pub fn run_sweep(mesh: Arc<Mesh>, base: &Params, config: &SweepConfig) -> Result<Vec<SweepRow>> {
    let grid = mesh.require_grid()?;

    let mut jobs = Vec::new();
    if config.mode.runs_presets() {
        for preset in &config.presets {
            let mut params = base.clone();
            preset.apply(&mut params)?;
            apply_overrides(&mut params, &config.overrides)?;
            jobs.push(SweepJob {
                mode: "preset",
                id: preset.name.clone(),
                params,
            });
        }
    }
    if config.mode.runs_phases() {
        for phase in config.phases()? {
            let mut params = base.clone();
            params.apply_phase(phase);
            apply_overrides(&mut params, &config.overrides)?;
            jobs.push(SweepJob {
                mode: "phase",
                id: format!("{phase:.2}"),
                params,
            });
        }
    }

    let _span = info_span!("sweep", rows = jobs.len(), nodes = mesh.len()).entered();
    let start = Instant::now();

    let rows = jobs
        .into_par_iter()
        .map(|job| -> Result<SweepRow> {
            let mut sim = Simulation::new(Arc::clone(&mesh), job.params, config.seed)?;
            sim.run(config.warmup + config.measure);
            let xi = correlation_length(&sim.state().structure, grid)?;
            let regime = Regime::classify(xi);
            debug!(mode = job.mode, id = %job.id, xi, %regime, "sweep row");
            Ok(SweepRow {
                mode: job.mode,
                id: job.id,
                correlation_length: xi,
                regime,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        rows = rows.len(),
        wall_time_ms = start.elapsed().as_millis() as u64,
        "sweep finished"
    );
    Ok(rows)
}

/// Sweep rows as CSV with a `mode,id,correlationLength,regime` header.
pub fn sweep_csv(rows: &[SweepRow]) -> String {
    let mut csv = String::from("mode,id,correlationLength,regime\n");
    for row in rows {
        writeln!(
            csv,
            "{},{},{:.3},{}",
            row.mode, row.id, row.correlation_length, row.regime
        )
        .ok();
    }
    csv
}

fn apply_overrides(params: &mut Params, overrides: &[(String, f64)]) -> Result<()> {
    params.apply_overrides(overrides.iter().map(|(k, v)| (k.as_str(), *v)))?;
    params.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use critflux_core::params::EngineVariant;
    use critflux_core::topology::{Topology, Wrap};

    fn lattice(height: usize, width: usize) -> Arc<Mesh> {
        Arc::new(
            Topology::Lattice {
                height,
                width,
                wrap: Wrap::Both,
            }
            .build()
            .unwrap(),
        )
    }

    #[test]
    fn phase_source_keeps_base_variant() {
        let base = Params::relaxed();
        let params = ParamSource::Phase(0.5).resolve(&base, &[]).unwrap();
        assert_eq!(params.variant, EngineVariant::Relaxed);
        assert_eq!(params, Params::from_phase(EngineVariant::Relaxed, 0.5));
    }

    #[test]
    fn preset_source_finds_builtins() {
        let params = ParamSource::Preset("Test B".into())
            .resolve(&Params::accounted(), &[])
            .unwrap();
        assert_eq!(params.variant, EngineVariant::Relaxed);
        assert_eq!(params.jitter, 0.8);
        assert!(ParamSource::Preset("nope".into())
            .resolve(&Params::accounted(), &[])
            .is_err());
    }

    #[test]
    fn phase_grid_covers_the_unit_interval() {
        let phases = SweepConfig::default().phases().unwrap();
        assert_eq!(phases.len(), 51);
        assert_eq!(phases[0], 0.0);
        assert!((phases[50] - 1.0).abs() < 1e-9);
        assert!(SweepConfig::default().with_phase_step(0.0).phases().is_err());
    }

    #[test]
    fn sweep_mode_parses() {
        assert_eq!("Both".parse::<SweepMode>().unwrap(), SweepMode::Both);
        assert_eq!("presets".parse::<SweepMode>().unwrap(), SweepMode::Presets);
        assert!("sideways".parse::<SweepMode>().is_err());
    }

    #[test]
    fn avalanche_table_layout() {
        let report = AvalancheReport {
            label: "phase 0.70".into(),
            cells: 100,
            warmup: 0,
            measure: 0,
            analysis: AvalancheAnalysis::from_sizes([100, 1, 1, 1, 1, 1, 1, 1, 1, 1]),
            wall_time_ms: 0,
        };
        let table = report.to_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "tau,0.528");
        assert_eq!(lines[1], "totalAvalanches,10");
        assert_eq!(lines[2], "avgSize,10.900");
        assert_eq!(lines[3], "logS,logP");
        assert_eq!(lines[4], "0.0000,0.9542");
        assert_eq!(lines[6], "Max/median ratio: 100.0");
        assert!(table.ends_with("(SOC: largest ~ total cells: 100)\n"));
    }

    #[test]
    fn few_avalanches_need_more_data() {
        let report = AvalancheReport {
            label: String::new(),
            cells: 1,
            warmup: 0,
            measure: 0,
            analysis: AvalancheAnalysis::from_sizes([3]),
            wall_time_ms: 0,
        };
        let table = report.to_table();
        assert!(table.starts_with("tau,n/a\n"));
        assert!(table.ends_with("Need more data\n"));
    }

    #[test]
    fn avalanche_run_is_reproducible() {
        let mesh = lattice(24, 24);
        let config = AvalancheConfig::new(50, 200);
        let mut a = Simulation::new(Arc::clone(&mesh), Params::accounted(), 1).unwrap();
        let mut b = Simulation::new(mesh, Params::accounted(), 1).unwrap();
        let ra = run_avalanche(&mut a, &config).unwrap();
        let rb = run_avalanche(&mut b, &config).unwrap();
        assert_eq!(ra.analysis, rb.analysis);
        assert_eq!(ra.cells, 24 * 24);
        assert_eq!(a.totals().steps, 250);
    }

    #[test]
    fn sweep_rows_follow_input_order() {
        let config = SweepConfig::new(5, 5)
            .with_phase_step(0.5)
            .with_presets(vec![
                Preset::find("test-b", &[]).unwrap(),
                Preset::find("test-a", &[]).unwrap(),
            ]);
        let rows = run_sweep(lattice(16, 16), &Params::accounted(), &config).unwrap();
        let ids: Vec<(&str, &str)> = rows.iter().map(|r| (r.mode, r.id.as_str())).collect();
        assert_eq!(
            ids,
            vec![
                ("preset", "test-b"),
                ("preset", "test-a"),
                ("phase", "0.00"),
                ("phase", "0.50"),
                ("phase", "1.00"),
            ]
        );
        let csv = sweep_csv(&rows);
        assert!(csv.starts_with("mode,id,correlationLength,regime\npreset,test-b,"));
        assert_eq!(csv.lines().count(), 6);
    }

    #[test]
    fn sweep_rejects_non_lattice_meshes() {
        let mesh = Arc::new(Topology::Icosphere { subdivisions: 1 }.build().unwrap());
        let err = run_sweep(mesh, &Params::accounted(), &SweepConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CritfluxError::Topology(critflux_core::error::TopologyError::NotALattice(_))
        ));
    }
}
