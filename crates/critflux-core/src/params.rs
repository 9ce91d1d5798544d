//! Parameters - the named, bounded knobs of the update rule.
//!
//! A [`Params`] value is immutable during a step and may be replaced
//! wholesale between steps. Every scalar has a name and a documented
//! `[min, max]` range (see [`PARAMS`]) and can be assigned by name, which
//! is how presets and configuration overrides are applied.
//!
//! The two [`EngineVariant`]s share one parameter struct. Each variant reads
//! the subset it needs; the others are carried along unused.

use crate::error::{ConfigError, CritfluxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which rule bundle the step engine applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineVariant {
    /// Energy-accounted structure: structure writes, upkeep and relaxation
    /// are paid for out of local energy, and information gain is limited
    /// by the energy a node can afford.
    #[default]
    Accounted,
    /// Structure moves by a fixed increment with no energy accounting, and
    /// information costs are charged unconditionally.
    Relaxed,
}

impl EngineVariant {
    pub const ALL: [EngineVariant; 2] = [EngineVariant::Accounted, EngineVariant::Relaxed];

    pub fn name(self) -> &'static str {
        match self {
            EngineVariant::Accounted => "accounted",
            EngineVariant::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for EngineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineVariant {
    type Err = CritfluxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accounted" | "lattice" => Ok(EngineVariant::Accounted),
            "relaxed" | "graph" => Ok(EngineVariant::Relaxed),
            _ => Err(ConfigError::UnknownVariant(s.to_string()).into()),
        }
    }
}

/// A named scalar parameter and its documented range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub doc: &'static str,
}

impl ParamSpec {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Full parameter set for one simulation.
///
/// Deserializing fills any field the document leaves out from the defaults
/// of the document's variant (Accounted when no variant is given).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParamsDocument")]
pub struct Params {
    pub variant: EngineVariant,

    pub dt: f64,
    pub diffusion: f64,
    pub evaporation: f64,
    /// Accounted conductance floor.
    pub sigma_base: f64,
    /// Accounted conductance gain on the product of endpoint structure.
    pub sigma_gain: f64,
    /// Relaxed transport factor of a fully structured node.
    pub sigma_slow: f64,

    pub sun_strength: f64,
    pub sun_width: f64,
    pub sun_speed: f64,
    pub sun_wobble: f64,
    pub sun_lat_bias: f64,

    pub info_threshold: f64,
    pub info_gain: f64,
    pub info_power: f64,
    pub info_decay: f64,
    pub info_cost: f64,
    pub info_energy_cost: f64,
    pub noise_floor: f64,

    pub sigma_on: f64,
    pub sigma_off: f64,
    pub sigma_rate: f64,
    pub sigma_step: f64,
    pub sigma_write_cost: f64,
    pub sigma_maint_cost: f64,
    pub sigma_relax: f64,

    pub collapse_i: f64,
    pub collapse_fraction: f64,
    pub collapse_remainder: f64,
    pub jitter: f64,
    pub jump_prob: f64,
}

/// Wire form of [`Params`]: a variant plus any subset of named scalars.
#[derive(Deserialize)]
struct ParamsDocument {
    #[serde(default)]
    variant: EngineVariant,
    #[serde(flatten)]
    values: BTreeMap<String, f64>,
}

impl TryFrom<ParamsDocument> for Params {
    type Error = CritfluxError;

    fn try_from(doc: ParamsDocument) -> Result<Self> {
        let mut params = Params::for_variant(doc.variant);
        for (name, value) in doc.values {
            let key = canonical_name(&name);
            let slot = params
                .slot_mut(&key)
                .ok_or_else(|| CritfluxError::unknown_parameter(name.as_str()))?;
            *slot = value;
        }
        Ok(params)
    }
}

/// Declares the bounds table together with by-name field access, so the two
/// can never drift apart.
macro_rules! param_table {
    ($($field:ident: [$min:expr, $max:expr], $doc:literal;)*) => {
        /// Every named scalar parameter with its documented range.
        pub const PARAMS: &[ParamSpec] = &[
            $(ParamSpec { name: stringify!($field), min: $min, max: $max, doc: $doc },)*
        ];

        impl Params {
            fn slot(&self, name: &str) -> Option<f64> {
                match name {
                    $(stringify!($field) => Some(self.$field),)*
                    _ => None,
                }
            }

            fn slot_mut(&mut self, name: &str) -> Option<&mut f64> {
                match name {
                    $(stringify!($field) => Some(&mut self.$field),)*
                    _ => None,
                }
            }
        }
    };
}

param_table! {
    dt: [0.01, 2.0], "integration step";
    diffusion: [0.0, 0.5], "diffusive transport rate";
    evaporation: [0.0, 0.2], "energy loss rate on positive energy";
    sigma_base: [0.0, 1.0], "conductance floor (accounted)";
    sigma_gain: [0.0, 5.0], "conductance gain from structure (accounted)";
    sigma_slow: [0.0, 1.0], "transport factor of full structure (relaxed)";
    sun_strength: [0.0, 1.0], "forcing amplitude";
    sun_width: [0.01, 2.0], "forcing band width";
    sun_speed: [0.0, 0.1], "forcing band angular speed";
    sun_wobble: [0.0, 1.0], "longitude wobble of the band";
    sun_lat_bias: [0.0, 1.0], "latitude excursion of the band (relaxed)";
    info_threshold: [0.0, 1.0], "flux level above which information accrues";
    info_gain: [0.0, 2.0], "information per unit excess flux";
    info_power: [0.5, 4.0], "exponent on excess flux (accounted)";
    info_decay: [0.0, 0.2], "information decay rate";
    info_cost: [0.0, 0.2], "per-step upkeep of held information (relaxed)";
    info_energy_cost: [0.0, 3.0], "energy per unit information";
    noise_floor: [0.0, 0.05], "flux-gated energy noise (relaxed)";
    sigma_on: [0.0, 3.0], "information level that grows structure";
    sigma_off: [0.0, 3.0], "information level that erodes structure";
    sigma_rate: [0.0, 0.1], "structure rate per unit distance from threshold (accounted)";
    sigma_step: [0.0, 0.2], "fixed structure increment (relaxed)";
    sigma_write_cost: [0.0, 3.0], "energy per unit structure written (accounted)";
    sigma_maint_cost: [0.0, 0.05], "energy upkeep per unit structure (accounted)";
    sigma_relax: [0.0, 0.05], "structure relaxation rate (accounted)";
    collapse_i: [0.05, 5.0], "information level that triggers collapse";
    collapse_fraction: [0.0, 1.0], "fraction of information released on collapse";
    collapse_remainder: [0.0, 1.0], "information kept after collapse (relaxed)";
    jitter: [0.0, 2.0], "redistribution weight noise";
    jump_prob: [0.0, 0.1], "chance of a long-range jump per collapse";
}

impl Default for Params {
    fn default() -> Self {
        Self::accounted()
    }
}

/// `x` limited to `[lo, hi]`. Unlike `f64::clamp` this never panics when
/// a derived upper bound dips below the lower one.
fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

impl Params {
    /// Lattice-engine defaults.
    pub fn accounted() -> Self {
        Self {
            variant: EngineVariant::Accounted,
            dt: 1.0,
            diffusion: 0.053,
            evaporation: 0.017,
            sigma_base: 0.327,
            sigma_gain: 3.34,
            sigma_slow: 0.76,
            sun_strength: 0.04,
            sun_width: 0.31,
            sun_speed: 0.0045,
            sun_wobble: 0.28,
            sun_lat_bias: 0.45,
            info_threshold: 0.078,
            info_gain: 0.744,
            info_power: 1.25,
            info_decay: 0.031,
            info_cost: 0.0,
            info_energy_cost: 1.0,
            noise_floor: 0.0,
            sigma_on: 0.61,
            sigma_off: 0.07,
            sigma_rate: 0.032,
            sigma_step: 0.02,
            sigma_write_cost: 0.9,
            sigma_maint_cost: 0.0151,
            sigma_relax: 0.0041,
            collapse_i: 1.49,
            collapse_fraction: 0.69,
            collapse_remainder: 0.25,
            jitter: 0.594,
            jump_prob: 0.0245,
        }
    }

    /// Graph-engine defaults.
    pub fn relaxed() -> Self {
        Self {
            variant: EngineVariant::Relaxed,
            dt: 0.5,
            diffusion: 0.07,
            evaporation: 0.013,
            sigma_base: 0.327,
            sigma_gain: 3.34,
            sigma_slow: 0.76,
            sun_strength: 0.16,
            sun_width: 0.13,
            sun_speed: 0.006,
            sun_wobble: 0.04,
            sun_lat_bias: 0.45,
            info_threshold: 0.12,
            info_gain: 0.84,
            info_power: 1.0,
            info_decay: 0.005,
            info_cost: 0.01,
            info_energy_cost: 0.9,
            noise_floor: 0.0,
            sigma_on: 0.69,
            sigma_off: 0.36,
            sigma_rate: 0.032,
            sigma_step: 0.02,
            sigma_write_cost: 0.9,
            sigma_maint_cost: 0.0151,
            sigma_relax: 0.0041,
            collapse_i: 1.05,
            collapse_fraction: 0.57,
            collapse_remainder: 0.25,
            jitter: 0.42,
            jump_prob: 0.0,
        }
    }

    pub fn for_variant(variant: EngineVariant) -> Self {
        match variant {
            EngineVariant::Accounted => Self::accounted(),
            EngineVariant::Relaxed => Self::relaxed(),
        }
    }

    /// Defaults for `variant` with the phase projection applied.
    pub fn from_phase(variant: EngineVariant, phase: f64) -> Self {
        let mut params = Self::for_variant(variant);
        params.apply_phase(phase);
        params
    }

    /// Derive the phase-controlled parameters from a single scalar in
    /// `[0, 1]`. Low phase is quiet and ordered; high phase is driven,
    /// conductive and avalanche-prone. Values outside `[0, 1]` are clamped.
    pub fn apply_phase(&mut self, phase: f64) {
        let p = if phase.is_nan() { 0.0 } else { phase.clamp(0.0, 1.0) };
        match self.variant {
            EngineVariant::Accounted => self.apply_accounted_phase(p),
            EngineVariant::Relaxed => self.apply_relaxed_phase(p),
        }
    }

    fn apply_accounted_phase(&mut self, p: f64) {
        self.diffusion = clamp(0.04 + 0.12 * p, 0.02, 0.20);
        self.sigma_gain = clamp(0.6 + 2.2 * p, 0.2, 3.2);
        self.sigma_base = clamp(0.20 - 0.16 * p, 0.02, 0.25);

        self.info_threshold = clamp(0.13 - 0.10 * p, 0.02, 0.18);
        self.info_gain = clamp(0.25 + 0.95 * p, 0.05, 1.4);
        self.info_power = clamp(1.25 + 1.15 * p, 1.0, 3.0);
        self.info_decay = clamp(0.030 - 0.020 * p, 0.005, 0.06);

        self.sigma_rate = clamp(0.002 + 0.014 * p, 0.001, 0.03);
        self.sigma_on = clamp(0.55 - 0.28 * p, 0.12, 0.75);
        self.sigma_off = clamp(self.sigma_on * 0.55, 0.05, self.sigma_on - 0.02);

        self.collapse_i = clamp(1.60 - 0.85 * p, 0.45, 1.80);
        self.collapse_fraction = clamp(0.12 + 0.55 * p, 0.05, 0.95);
        self.jitter = clamp(0.10 + 0.95 * p, 0.0, 1.3);
        self.jump_prob = if p > 0.75 {
            0.0005 + 0.02 * (p - 0.75)
        } else {
            0.0003
        };

        self.sun_strength = clamp(0.08 + 0.22 * p, 0.03, 0.35);
        self.sun_width = clamp(0.30 - 0.18 * p, 0.08, 0.45);
        self.evaporation = clamp(0.006 - 0.004 * p, 0.001, 0.02);

        self.sigma_write_cost = clamp(0.25 + 1.25 * p, 0.05, 1.8);
        self.sigma_maint_cost = clamp(0.0006 + 0.004 * p, 0.0002, 0.010);
        self.sigma_relax = clamp(0.001 + 0.006 * p, 0.0005, 0.02);
    }

    fn apply_relaxed_phase(&mut self, p: f64) {
        self.diffusion = clamp(0.08 + 0.08 * p, 0.04, 0.2);
        self.sigma_slow = clamp(0.5 - 0.17 * p, 0.15, 0.6);
        self.info_threshold = clamp(0.09 - 0.06 * p, 0.02, 0.12);
        self.info_decay = clamp(0.015 - 0.012 * p, 0.0, 0.03);
        self.collapse_i = clamp(1.8 - 0.48 * p, 0.6, 1.8);
        self.sun_strength = clamp(0.08 + 0.106 * p, 0.05, 0.2);
        self.info_energy_cost = clamp(1.9 - 1.8 * p, 0.5, 2.0);
        self.noise_floor = if p > 0.85 {
            0.001 * (p - 0.85) / 0.15
        } else {
            0.0
        };
    }

    /// Look up a parameter by name. Names are matched case-insensitively and
    /// `-` is accepted for `_`; the original UI spellings `collapse_I` and
    /// `sun_lon_wobble` are understood.
    pub fn get(&self, name: &str) -> Result<f64> {
        let key = canonical_name(name);
        self.slot(&key)
            .ok_or_else(|| CritfluxError::unknown_parameter(name))
    }

    /// Assign a parameter by name, rejecting unknown names, non-finite
    /// values and values outside the documented range.
    pub fn set(&mut self, name: &str, value: f64) -> Result<()> {
        let key = canonical_name(name);
        let spec = spec(&key).ok_or_else(|| CritfluxError::unknown_parameter(name))?;
        if !value.is_finite() {
            return Err(ConfigError::NotFinite {
                field: spec.name.to_string(),
            }
            .into());
        }
        if !spec.contains(value) {
            return Err(CritfluxError::out_of_range(spec.name, spec.min, spec.max, value));
        }
        if let Some(slot) = self.slot_mut(spec.name) {
            *slot = value;
        }
        Ok(())
    }

    /// Apply a batch of named overrides in order.
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (name, value) in overrides {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// `(name, value)` for every scalar, in table order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        PARAMS
            .iter()
            .filter_map(|spec| self.slot(spec.name).map(|v| (spec.name, v)))
            .collect()
    }

    /// Check every scalar against its range and the hysteresis ordering.
    pub fn validate(&self) -> Result<()> {
        for spec in PARAMS {
            let Some(value) = self.slot(spec.name) else {
                continue;
            };
            if !value.is_finite() {
                return Err(ConfigError::NotFinite {
                    field: spec.name.to_string(),
                }
                .into());
            }
            if !spec.contains(value) {
                return Err(CritfluxError::out_of_range(spec.name, spec.min, spec.max, value));
            }
        }
        if self.sigma_off > self.sigma_on {
            return Err(ConfigError::InvertedHysteresis {
                on: self.sigma_on,
                off: self.sigma_off,
            }
            .into());
        }
        Ok(())
    }

    /// Largest edge conductance the transport phase can produce.
    pub fn max_conductance(&self) -> f64 {
        match self.variant {
            EngineVariant::Accounted => self.diffusion * (self.sigma_base + self.sigma_gain),
            EngineVariant::Relaxed => self.diffusion * self.sigma_slow.max(1.0),
        }
    }

    /// Explicit-Euler diffusion number `dt · k_max · max_degree`. Transport
    /// is stable while this stays at or below 1; beyond it energy can
    /// oscillate between neighbors with growing amplitude.
    pub fn stability_estimate(&self, max_degree: usize) -> f64 {
        self.dt * self.max_conductance() * max_degree as f64
    }
}

/// Range entry for a canonical parameter name.
pub fn spec(name: &str) -> Option<&'static ParamSpec> {
    PARAMS.iter().find(|spec| spec.name == name)
}

fn canonical_name(name: &str) -> String {
    let key = name.trim().to_ascii_lowercase().replace('-', "_");
    match key.as_str() {
        "sun_lon_wobble" => "sun_wobble".to_string(),
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Params::accounted().validate().unwrap();
        Params::relaxed().validate().unwrap();
        assert_eq!(Params::default().variant, EngineVariant::Accounted);
    }

    #[test]
    fn variant_parses() {
        assert_eq!("Relaxed".parse::<EngineVariant>().unwrap(), EngineVariant::Relaxed);
        assert_eq!("lattice".parse::<EngineVariant>().unwrap(), EngineVariant::Accounted);
        assert!("hybrid".parse::<EngineVariant>().is_err());
    }

    #[test]
    fn phase_projection_stays_in_bounds() {
        for variant in EngineVariant::ALL {
            for k in 0..=100 {
                let p = k as f64 / 100.0;
                let params = Params::from_phase(variant, p);
                params
                    .validate()
                    .unwrap_or_else(|e| panic!("{variant} phase {p}: {e}"));
            }
        }
    }

    #[test]
    fn phase_moves_in_documented_directions() {
        let low = Params::from_phase(EngineVariant::Accounted, 0.0);
        let high = Params::from_phase(EngineVariant::Accounted, 1.0);
        assert!(high.diffusion > low.diffusion);
        assert!(high.collapse_i < low.collapse_i);
        assert!(high.sigma_on < low.sigma_on);
        assert!(high.jump_prob > low.jump_prob);

        let low = Params::from_phase(EngineVariant::Relaxed, 0.0);
        let high = Params::from_phase(EngineVariant::Relaxed, 1.0);
        assert!(high.diffusion > low.diffusion);
        assert!(high.collapse_i < low.collapse_i);
        assert_eq!(low.noise_floor, 0.0);
        assert!((high.noise_floor - 0.001).abs() < 1e-12);
    }

    #[test]
    fn accounted_phase_keeps_hysteresis_gap() {
        for k in 0..=20 {
            let params = Params::from_phase(EngineVariant::Accounted, k as f64 / 20.0);
            assert!(params.sigma_off <= params.sigma_on - 0.02 + 1e-12);
        }
    }

    #[test]
    fn direct_assignment_after_phase_wins() {
        let mut params = Params::from_phase(EngineVariant::Accounted, 0.7);
        params.set("diffusion", 0.11).unwrap();
        assert_eq!(params.diffusion, 0.11);
    }

    #[test]
    fn set_and_get_by_name() {
        let mut params = Params::relaxed();
        params.set("collapse_I", 0.9).unwrap();
        assert_eq!(params.collapse_i, 0.9);
        params.set("sun-lon-wobble", 0.3).unwrap();
        assert_eq!(params.get("sun_wobble").unwrap(), 0.3);
    }

    #[test]
    fn set_rejects_bad_input() {
        let mut params = Params::accounted();
        assert!(matches!(
            params.set("viscosity", 1.0),
            Err(CritfluxError::Config(ConfigError::UnknownParameter(_)))
        ));
        assert!(matches!(
            params.set("diffusion", 0.9),
            Err(CritfluxError::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(matches!(
            params.set("jitter", f64::NAN),
            Err(CritfluxError::Config(ConfigError::NotFinite { .. }))
        ));
        assert_eq!(params.diffusion, 0.053);
    }

    #[test]
    fn validate_rejects_inverted_band() {
        let mut params = Params::accounted();
        params.sigma_off = 0.9;
        assert!(matches!(
            params.validate(),
            Err(CritfluxError::Config(ConfigError::InvertedHysteresis { .. }))
        ));
    }

    #[test]
    fn entries_cover_the_table() {
        let params = Params::accounted();
        assert_eq!(params.entries().len(), PARAMS.len());
        for spec in PARAMS {
            assert!(spec.min <= spec.max, "{} has an inverted range", spec.name);
        }
    }

    #[test]
    fn default_stability_estimates_are_stable() {
        assert!(Params::accounted().stability_estimate(4) <= 1.0);
        assert!(Params::relaxed().stability_estimate(6) <= 1.0);
    }

    #[test]
    fn params_deserialize_with_original_spellings() {
        let params: Params =
            serde_json::from_str(r#"{"variant":"relaxed","collapse_I":0.7,"sun_lon_wobble":0.2}"#)
                .unwrap();
        assert_eq!(params.variant, EngineVariant::Relaxed);
        assert_eq!(params.collapse_i, 0.7);
        assert_eq!(params.sun_wobble, 0.2);
    }

    #[test]
    fn missing_fields_come_from_the_documents_variant() {
        let params: Params =
            serde_json::from_str(r#"{"variant":"relaxed","diffusion":0.1}"#).unwrap();
        let expected = Params {
            diffusion: 0.1,
            ..Params::relaxed()
        };
        assert_eq!(params, expected);

        let params: Params = serde_json::from_str(r#"{"jitter":0.3}"#).unwrap();
        assert_eq!(
            params,
            Params {
                jitter: 0.3,
                ..Params::accounted()
            }
        );
    }

    #[test]
    fn serialized_params_read_back_unchanged() {
        let params = Params::from_phase(EngineVariant::Relaxed, 0.9);
        let text = serde_json::to_string(&params).unwrap();
        assert_eq!(serde_json::from_str::<Params>(&text).unwrap(), params);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<Params>(r#"{"variant":"relaxed","difusion":0.1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("difusion"), "{err}");
    }
}
