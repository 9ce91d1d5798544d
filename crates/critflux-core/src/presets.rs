//! Presets - named override dictionaries applied on top of a parameter set.

use crate::error::{ConfigError, Result};
use crate::params::{EngineVariant, Params};
use serde::{Deserialize, Serialize};

/// A named set of parameter overrides.
///
/// When the preset pins a variant different from the target's, the target
/// is first reset to that variant's defaults so no values from the other
/// rule bundle leak through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default)]
    pub variant: Option<EngineVariant>,
    /// Overrides in application order.
    #[serde(default)]
    pub overrides: Vec<(String, f64)>,
}

const TEST_A: &[(&str, f64)] = &[
    ("diffusion", 0.14),
    ("sigma_slow", 0.42),
    ("evaporation", 0.008),
    ("info_gain", 0.75),
    ("info_threshold", 0.045),
    ("info_decay", 0.005),
    ("info_cost", 0.022),
    ("info_energy_cost", 1.15),
    ("sigma_on", 0.7),
    ("sigma_off", 0.34),
    ("collapse_i", 0.56),
    ("collapse_fraction", 0.57),
    ("jitter", 0.42),
    ("sun_strength", 0.19),
    ("sun_width", 0.37),
    ("sun_speed", 0.025),
    ("sun_lat_bias", 0.45),
    ("sun_wobble", 0.39),
    ("noise_floor", 0.003),
];

const TEST_B: &[(&str, f64)] = &[
    ("diffusion", 0.16),
    ("sigma_slow", 0.17),
    ("evaporation", 0.011),
    ("info_gain", 0.35),
    ("info_threshold", 0.075),
    ("info_decay", 0.016),
    ("info_cost", 0.022),
    ("info_energy_cost", 0.6),
    ("sigma_on", 0.7),
    ("sigma_off", 0.34),
    ("collapse_i", 0.8),
    ("collapse_fraction", 0.45),
    ("jitter", 0.8),
    ("sun_strength", 0.12),
    ("sun_width", 0.37),
    ("sun_speed", 0.025),
    ("sun_lat_bias", 0.45),
    ("sun_wobble", 0.39),
    ("noise_floor", 0.0085),
];

impl Preset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: None,
            overrides: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: EngineVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.overrides.push((name.into(), value));
        self
    }

    fn from_table(name: &str, variant: EngineVariant, table: &[(&str, f64)]) -> Self {
        table
            .iter()
            .fold(Self::new(name).with_variant(variant), |p, &(k, v)| p.with(k, v))
    }

    /// The presets shipped with the library, in display order.
    pub fn builtin() -> Vec<Preset> {
        vec![
            Self::new("accounted-default").with_variant(EngineVariant::Accounted),
            Self::new("relaxed-default").with_variant(EngineVariant::Relaxed),
            Self::from_table("test-a", EngineVariant::Relaxed, TEST_A),
            Self::from_table("test-b", EngineVariant::Relaxed, TEST_B),
        ]
    }

    /// Find a preset by name among `extra` first, then the built-ins.
    ///
    /// Matching ignores case and treats spaces and underscores as `-`, so
    /// `"Test A"` finds `test-a`; a bare suffix such as `"B"` also finds
    /// `test-b`.
    pub fn find(name: &str, extra: &[Preset]) -> Result<Preset> {
        let wanted = normalize(name);
        let short = format!("test-{wanted}");
        extra
            .iter()
            .cloned()
            .chain(Self::builtin())
            .find(|p| {
                let have = normalize(&p.name);
                have == wanted || have == short
            })
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()).into())
    }

    /// Apply this preset to `params`.
    pub fn apply(&self, params: &mut Params) -> Result<()> {
        if let Some(variant) = self.variant {
            if params.variant != variant {
                *params = Params::for_variant(variant);
            }
        }
        params.apply_overrides(self.overrides.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// This preset applied to its variant's defaults (accounted when unpinned).
    pub fn params(&self) -> Result<Params> {
        let mut params = Params::for_variant(self.variant.unwrap_or_default());
        self.apply(&mut params)?;
        Ok(params)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace([' ', '_'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_presets_validate() {
        for preset in Preset::builtin() {
            let params = preset.params().unwrap();
            params.validate().unwrap();
        }
    }

    #[test]
    fn find_is_forgiving_about_spelling() {
        assert_eq!(Preset::find("Test A", &[]).unwrap().name, "test-a");
        assert_eq!(Preset::find("test_b", &[]).unwrap().name, "test-b");
        assert_eq!(Preset::find("B", &[]).unwrap().name, "test-b");
        assert!(Preset::find("test-z", &[]).is_err());
    }

    #[test]
    fn user_presets_shadow_builtins() {
        let mine = Preset::new("test-a").with("diffusion", 0.01);
        let found = Preset::find("test-a", std::slice::from_ref(&mine)).unwrap();
        assert_eq!(found, mine);
    }

    #[test]
    fn pinned_variant_resets_foreign_defaults() {
        let mut params = Params::accounted();
        Preset::find("test-a", &[]).unwrap().apply(&mut params).unwrap();
        assert_eq!(params.variant, EngineVariant::Relaxed);
        assert_eq!(params.diffusion, 0.14);
        // Not named by the preset, so it comes from the relaxed defaults.
        assert_eq!(params.jump_prob, 0.0);
        assert_eq!(params.dt, 0.5);
    }

    #[test]
    fn unpinned_preset_keeps_current_values() {
        let mut params = Params::from_phase(EngineVariant::Accounted, 0.3);
        let before = params.clone();
        Preset::new("tweak").with("jitter", 0.2).apply(&mut params).unwrap();
        assert_eq!(params.jitter, 0.2);
        assert_eq!(params.diffusion, before.diffusion);
    }

    #[test]
    fn bad_override_is_reported() {
        let preset = Preset::new("broken").with("diffusion", 7.0);
        assert!(preset.params().is_err());
    }
}
