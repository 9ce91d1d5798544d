//! Step engine - one discrete-time update of the field state.
//!
//! Each step runs five ordered phases:
//! 1. Forcing and evaporation accumulate into the energy scratch
//! 2. Diffusive transport over every undirected edge, tracking flux
//! 3. Information accrual from flux, with its energy cost and decay
//! 4. Commit E and I, then integrate structure hysteresis
//! 5. Collapse: nodes over threshold release energy to their neighbors
//!
//! Phases 1–3 only read committed fields and write scratch. Collapse is
//! order-dependent: nodes are visited in ascending index order and random
//! draws are consumed per neighbor in neighbor-list order, then one draw
//! for the jump test and one for the jump target.

use critflux_core::error::{CritfluxError, Result, TopologyError};
use critflux_core::geometry::{lon_fraction, wrapped_delta};
use critflux_core::graph::AdjacencyGraph;
use critflux_core::params::{EngineVariant, Params};
use critflux_core::state::FieldState;
use critflux_core::topology::Mesh;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Aggregate energy flows of one step.
///
/// `drive` and `dissipation` are energy amounts actually added to and
/// removed from the field, so `ΣE` after the step equals `ΣE` before plus
/// `drive - dissipation`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub drive: f64,
    pub dissipation: f64,
    pub collapse_count: usize,
    pub release_sum: f64,
}

impl StepReport {
    /// Fold another report into this one.
    pub fn accumulate(&mut self, other: &StepReport) {
        self.drive += other.drive;
        self.dissipation += other.dissipation;
        self.collapse_count += other.collapse_count;
        self.release_sum += other.release_sum;
    }
}

/// Per-node forcing coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Forcing<'a> {
    pub lats: &'a [f64],
    pub lons: &'a [f64],
    /// Period of the latitude coordinate when it wraps.
    pub lat_period: Option<f64>,
}

impl<'a> Forcing<'a> {
    pub fn from_mesh(mesh: &'a Mesh) -> Self {
        Self {
            lats: &mesh.lats,
            lons: &mesh.lons,
            lat_period: mesh.lat_period,
        }
    }
}

/// `x` limited to `[0, 1]`, with NaN mapped to 0.
#[inline]
pub fn clamp01(x: f64) -> f64 {
    if x > 0.0 {
        if x < 1.0 {
            x
        } else {
            1.0
        }
    } else {
        0.0
    }
}

/// `max(0, x)`, with NaN mapped to 0.
#[inline]
fn non_negative(x: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

/// The moving forcing band at time `t`.
struct Band {
    center: f64,
    wobble: f64,
    width: f64,
}

impl Band {
    fn at(params: &Params, t: f64) -> Self {
        let phase = t * params.sun_speed;
        match params.variant {
            // Band sweeps ±0.35π in latitude; width is a fraction of the
            // latitude range.
            EngineVariant::Accounted => Self {
                center: 0.35 * PI * phase.sin(),
                wobble: (phase * 0.73).sin() * params.sun_wobble,
                width: (params.sun_width * PI).max(1e-6),
            },
            EngineVariant::Relaxed => Self {
                center: phase.sin() * (0.6 + 0.35 * params.sun_lat_bias),
                wobble: (phase * 0.7).sin() * params.sun_wobble,
                width: params.sun_width.max(1e-6),
            },
        }
    }

    fn inject(&self, strength: f64, lat: f64, lon: f64, lat_period: Option<f64>) -> f64 {
        let dlat = match lat_period {
            Some(period) => wrapped_delta(lat, self.center, period),
            None => lat - self.center,
        };
        let dy = dlat / self.width;
        let lat_factor = (-0.5 * dy * dy).exp();
        let lon_factor = 0.65 + 0.35 * (2.0 * PI * (lon_fraction(lon) + self.wobble)).sin();
        strength * lat_factor * lon_factor
    }
}

/// Advance `state` by one step at time `t`.
///
/// Rejects a state, graph or coordinate set whose lengths disagree, and
/// any neighbor index outside the graph. Once those checks pass the step
/// cannot fail. `state.time` is left to the driver.
pub fn step<G, R>(
    state: &mut FieldState,
    params: &Params,
    graph: &G,
    forcing: Forcing<'_>,
    t: f64,
    rng: &mut R,
) -> Result<StepReport>
where
    G: AdjacencyGraph + ?Sized,
    R: Rng + ?Sized,
{
    check_shapes(state, graph, &forcing)?;
    Ok(step_unchecked(state, params, graph, forcing, t, rng))
}

/// [`step`] over a mesh's own graph and coordinates.
pub fn step_mesh<R: Rng + ?Sized>(
    state: &mut FieldState,
    params: &Params,
    mesh: &Mesh,
    t: f64,
    rng: &mut R,
) -> Result<StepReport> {
    step(state, params, mesh, Forcing::from_mesh(mesh), t, rng)
}

pub(crate) fn check_shapes<G: AdjacencyGraph + ?Sized>(
    state: &FieldState,
    graph: &G,
    forcing: &Forcing<'_>,
) -> Result<()> {
    let n = graph.node_count();
    state.check_len(n)?;
    if forcing.lats.len() != n {
        return Err(CritfluxError::length_mismatch("lats", n, forcing.lats.len()));
    }
    if forcing.lons.len() != n {
        return Err(CritfluxError::length_mismatch("lons", n, forcing.lons.len()));
    }
    for node in 0..n {
        if let Some(&neighbor) = graph.neighbors(node).iter().find(|&&j| j >= n) {
            return Err(TopologyError::NeighborOutOfRange {
                node,
                neighbor,
                count: n,
            }
            .into());
        }
    }
    Ok(())
}

/// The step proper. Callers guarantee consistent shapes.
pub(crate) fn step_unchecked<G, R>(
    state: &mut FieldState,
    params: &Params,
    graph: &G,
    forcing: Forcing<'_>,
    t: f64,
    rng: &mut R,
) -> StepReport
where
    G: AdjacencyGraph + ?Sized,
    R: Rng + ?Sized,
{
    let n = state.len();
    let dt = params.dt;
    let mut report = StepReport::default();
    state.scratch.clear(n);

    let FieldState {
        energy,
        info,
        structure,
        scratch,
        ..
    } = state;
    let d_energy = &mut scratch.d_energy;
    let d_info = &mut scratch.d_info;
    let flux = &mut scratch.flux;
    let slow = &mut scratch.slow;

    // Phase 1: forcing and evaporation
    let band = Band::at(params, t);
    for i in 0..n {
        let inject = band.inject(
            params.sun_strength,
            forcing.lats[i],
            forcing.lons[i],
            forcing.lat_period,
        );
        let evap = params.evaporation * non_negative(energy[i]);
        d_energy[i] += inject - evap;
        report.drive += inject * dt;
        report.dissipation += evap * dt;
        slow[i] = 1.0 - clamp01(structure[i]) * (1.0 - params.sigma_slow);
    }

    // Phase 2: diffusive transport, each undirected edge once
    for i in 0..n {
        let ei = energy[i];
        let si = clamp01(structure[i]);
        for &j in graph.neighbors(i) {
            if j <= i {
                continue;
            }
            let d = energy[j] - ei;
            let conductance = match params.variant {
                EngineVariant::Accounted => {
                    params.diffusion
                        * (params.sigma_base + params.sigma_gain * si * clamp01(structure[j]))
                }
                EngineVariant::Relaxed => params.diffusion * 0.5 * (slow[i] + slow[j]),
            };
            let flow = conductance * d;
            d_energy[i] += flow;
            d_energy[j] -= flow;
            flux[i] += d.abs();
            flux[j] += d.abs();
        }
    }

    // Phase 3: information accrual, cost and decay
    let iec = params.info_energy_cost;
    for i in 0..n {
        let deg = graph.degree(i).max(1) as f64;
        let flux_mag = flux[i] / deg;
        let above = non_negative(flux_mag - params.info_threshold);
        match params.variant {
            EngineVariant::Accounted => {
                let gain = params.info_gain * above.powf(params.info_power);
                let predicted = energy[i] + d_energy[i] * dt;
                let cost = gain * iec;
                let afford = if cost > 0.0 {
                    (non_negative(predicted) / (cost * dt + 1e-12)).min(1.0)
                } else {
                    1.0
                };
                let applied = gain * afford;
                d_info[i] += applied;
                d_energy[i] -= applied * iec;
                report.dissipation += applied * iec * dt;

                // Decay returns the energy its information cost.
                let decay = params.info_decay * info[i];
                d_info[i] -= decay;
                d_energy[i] += decay * iec;
                report.dissipation -= decay * iec * dt;
            }
            EngineVariant::Relaxed => {
                let gain = params.info_gain * above;
                d_info[i] += gain;
                d_energy[i] -= gain * iec;
                report.dissipation += gain * iec * dt;

                if params.noise_floor > 0.0 {
                    let gate = clamp01(
                        (flux_mag - params.info_threshold) / (params.info_threshold + 1e-6),
                    );
                    let kick = params.noise_floor * (rng.gen::<f64>() - 0.5) * gate.powi(4);
                    d_energy[i] += kick;
                    report.drive += kick * dt;
                }

                let support = clamp01(structure[i])
                    * clamp01(flux_mag / (params.info_threshold + 1e-6));
                let decay = params.info_decay * (1.0 - 0.6 * support);
                let upkeep = params.info_cost * (1.0 - 0.6 * support) * info[i];
                d_info[i] -= decay * info[i];
                d_energy[i] -= upkeep;
                report.dissipation += upkeep * dt;
            }
        }
    }

    // Phase 4: commit, then structure
    for i in 0..n {
        energy[i] += d_energy[i] * dt;
        info[i] = non_negative(info[i] + d_info[i] * dt);
    }
    match params.variant {
        EngineVariant::Accounted => {
            for i in 0..n {
                report.dissipation += integrate_accounted_structure(
                    params,
                    info[i],
                    &mut energy[i],
                    &mut structure[i],
                );
            }
        }
        EngineVariant::Relaxed => {
            for i in 0..n {
                let s = clamp01(structure[i]);
                structure[i] = if info[i] >= params.sigma_on {
                    clamp01(s + params.sigma_step)
                } else if info[i] <= params.sigma_off {
                    clamp01(s - params.sigma_step)
                } else {
                    s
                };
            }
        }
    }

    // Phase 5: collapse in ascending index order
    let mut weights: Vec<f64> = Vec::new();
    for i in 0..n {
        if !(info[i] >= params.collapse_i) {
            continue;
        }
        let nb = graph.neighbors(i);
        if nb.is_empty() {
            continue;
        }
        let max_release = params.collapse_fraction * info[i] * iec;
        let release = non_negative(energy[i]).min(max_release);
        if !(release > 0.0) {
            continue;
        }
        report.collapse_count += 1;
        report.release_sum += release;

        info[i] = match params.variant {
            EngineVariant::Accounted => non_negative(info[i] - release / iec),
            EngineVariant::Relaxed => info[i] * params.collapse_remainder,
        };
        if info[i] < params.sigma_off {
            structure[i] *= 0.5;
        }

        weights.clear();
        for &j in nb {
            let sj = clamp01(structure[j]);
            let u = rng.gen::<f64>() - 0.5;
            let (base, jit) = match params.variant {
                EngineVariant::Accounted => (0.8 + 0.4 * (1.0 - sj), (params.jitter * u).exp()),
                EngineVariant::Relaxed => (0.6 + 0.8 * sj, 1.0 + params.jitter * u),
            };
            weights.push((base * jit).max(1e-3));
        }
        let mut sum_w: f64 = weights.iter().sum();
        if !(sum_w > 0.0 && sum_w.is_finite()) {
            // Equal shares
            weights.iter_mut().for_each(|w| *w = 1.0);
            sum_w = weights.len() as f64;
        }
        let norm = release / sum_w;
        for (&j, &w) in nb.iter().zip(&weights) {
            energy[j] += w * norm;
        }
        energy[i] -= release;

        if rng.gen::<f64>() < params.jump_prob {
            let j = rng.gen_range(0..n);
            let share = 0.5 * release;
            energy[j] += share;
            energy[i] -= share;
        }
    }

    report
}

/// Energy-accounted structure update for one node. Returns the net energy
/// dissipated (write and upkeep costs less the relaxation refund).
fn integrate_accounted_structure(
    params: &Params,
    info: f64,
    energy: &mut f64,
    structure: &mut f64,
) -> f64 {
    let dt = params.dt;
    let s0 = clamp01(*structure);
    let ds = if info >= params.sigma_on {
        params.sigma_rate * (info - params.sigma_on)
    } else if info <= params.sigma_off {
        params.sigma_rate * (info - params.sigma_off)
    } else {
        0.0
    };
    let mut s1 = clamp01(s0 + ds * dt);
    let wrote = non_negative(s1 - s0);
    let mut spent = 0.0;

    if wrote > 0.0 {
        let cost = wrote * params.sigma_write_cost;
        let paid = non_negative(*energy).min(cost);
        *energy -= paid;
        spent += paid;
        // Partial payment buys a proportional write.
        if paid < cost {
            s1 = s0 + wrote * (paid / (cost + 1e-12));
        }
    }

    let upkeep = non_negative(*energy).min(params.sigma_maint_cost * s1);
    *energy -= upkeep;
    spent += upkeep;

    let s2 = clamp01(s1 - params.sigma_relax * s1);
    let refund = (s1 - s2) * params.sigma_write_cost * 0.6;
    *energy += refund;
    *structure = s2;

    spent - refund
}

#[cfg(test)]
mod tests {
    use super::*;
    use critflux_core::topology::{Topology, Wrap};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn lattice(h: usize, w: usize) -> Mesh {
        Topology::Lattice {
            height: h,
            width: w,
            wrap: Wrap::Both,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn clamp01_maps_nan_to_zero() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(0.25), 0.25);
    }

    #[test]
    fn accounted_band_matches_row_geometry() {
        // On a vertically wrapped lattice the band center at t = 0 sits at
        // the middle row, and distances wrap.
        let mesh = lattice(20, 10);
        let params = Params::accounted();
        let band = Band::at(&params, 0.0);
        assert_eq!(band.center, 0.0);
        let top = band.inject(1.0, mesh.lats[0], 0.0, mesh.lat_period);
        let middle = band.inject(1.0, mesh.lats[10 * 10], 0.0, mesh.lat_period);
        assert!(middle > top);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let mesh = lattice(4, 4);
        let mut state = FieldState::new(15, 1).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let err = step_mesh(&mut state, &Params::accounted(), &mesh, 0.0, &mut rng).unwrap_err();
        assert!(matches!(err, CritfluxError::Shape(_)));

        let mut state = FieldState::new(16, 1).unwrap();
        let short = vec![0.0; 3];
        let forcing = Forcing {
            lats: &short,
            lons: &mesh.lons,
            lat_period: None,
        };
        assert!(step(&mut state, &Params::accounted(), &mesh, forcing, 0.0, &mut rng).is_err());
    }

    #[test]
    fn rejects_out_of_range_neighbors() {
        let graph: Vec<Vec<usize>> = vec![vec![1], vec![0, 7]];
        let mut state = FieldState::new(2, 1).unwrap();
        let coords = vec![0.0; 2];
        let forcing = Forcing {
            lats: &coords,
            lons: &coords,
            lat_period: None,
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let err = step(&mut state, &Params::relaxed(), &graph, forcing, 0.0, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            CritfluxError::Topology(TopologyError::NeighborOutOfRange { neighbor: 7, .. })
        ));
    }

    #[test]
    fn structure_write_is_paid_for() {
        let mut params = Params::accounted();
        params.sigma_rate = 0.1;
        params.sigma_write_cost = 1.0;
        params.sigma_maint_cost = 0.0;
        params.sigma_relax = 0.0;

        let mut energy = 10.0;
        let mut structure = 0.0;
        let spent =
            integrate_accounted_structure(&params, params.sigma_on + 1.0, &mut energy, &mut structure);
        assert!((structure - 0.1).abs() < 1e-12);
        assert!((energy - 9.9).abs() < 1e-12);
        assert!((spent - 0.1).abs() < 1e-12);

        // Half the funds buy half the write.
        let mut energy = 0.05;
        let mut structure = 0.0;
        integrate_accounted_structure(&params, params.sigma_on + 1.0, &mut energy, &mut structure);
        assert!((structure - 0.05).abs() < 1e-9);
        assert!(energy.abs() < 1e-12);
    }

    #[test]
    fn structure_stays_in_dead_zone() {
        let params = Params::accounted();
        let mut energy = 1.0;
        let mut structure = 0.4;
        let mid = 0.5 * (params.sigma_on + params.sigma_off);
        integrate_accounted_structure(&params, mid, &mut energy, &mut structure);
        // Only upkeep and relaxation act between the thresholds.
        assert!(structure < 0.4 && structure > 0.39);
    }

    #[test]
    fn relaxed_structure_moves_by_fixed_step() {
        let mesh = lattice(4, 4);
        let mut params = Params::relaxed();
        params.sun_strength = 0.0;
        params.info_gain = 0.0;
        params.info_decay = 0.0;
        params.collapse_i = 5.0;
        let mut state = FieldState::new(mesh.len(), 1).unwrap();
        state.info[0] = params.sigma_on + 0.1;
        state.structure[1] = 0.5;
        let mut rng = SmallRng::seed_from_u64(1);
        step_mesh(&mut state, &params, &mesh, 0.0, &mut rng).unwrap();
        assert!((state.structure[0] - params.sigma_step).abs() < 1e-12);
        assert!((state.structure[1] - (0.5 - params.sigma_step)).abs() < 1e-12);
    }

    #[test]
    fn report_balances_energy() {
        for params in [Params::from_phase(EngineVariant::Accounted, 0.5), Params::relaxed()] {
            let mesh = lattice(12, 14);
            let mut state = FieldState::new(mesh.len(), 4).unwrap();
            let mut rng = SmallRng::seed_from_u64(9);
            let mut t = 0.0;
            for _ in 0..200 {
                let before = state.total_energy();
                let report = step_mesh(&mut state, &params, &mesh, t, &mut rng).unwrap();
                let after = state.total_energy();
                let expected = before + report.drive - report.dissipation;
                assert!(
                    (after - expected).abs() < 1e-9 * (1.0 + after.abs()),
                    "{}: {after} vs {expected}",
                    params.variant
                );
                t += params.dt;
            }
        }
    }
}
