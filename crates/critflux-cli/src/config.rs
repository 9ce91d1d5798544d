//! Configuration management for the critflux CLI.

use anyhow::{Context, Result};
use critflux::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "critflux.toml";

/// Project configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub analysis: AnalysisSection,
    /// Direct parameter overrides, applied after any phase or preset.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// User presets, consulted before the built-ins.
    #[serde(default)]
    pub presets: BTreeMap<String, PresetSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_topology")]
    pub topology: String,
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub variant: EngineVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSection {
    #[serde(default = "default_avalanche_warmup")]
    pub avalanche_warmup: u64,
    #[serde(default = "default_avalanche_measure")]
    pub avalanche_measure: u64,
    #[serde(default = "default_avalanche_phase")]
    pub avalanche_phase: f64,
    #[serde(default = "default_quiet_period")]
    pub quiet_period: f64,
    #[serde(default = "default_sweep_warmup")]
    pub sweep_warmup: u64,
    #[serde(default = "default_sweep_measure")]
    pub sweep_measure: u64,
    #[serde(default = "default_phase_step")]
    pub phase_step: f64,
}

/// A `[presets.<name>]` table: an optional variant pin plus overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresetSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<EngineVariant>,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

// Default value functions
fn default_topology() -> String { "lattice".to_string() }
fn default_resolution() -> usize { 4 }
fn default_seed() -> u64 { 1 }
fn default_avalanche_warmup() -> u64 { 1000 }
fn default_avalanche_measure() -> u64 { 4000 }
fn default_avalanche_phase() -> f64 { 0.70 }
fn default_quiet_period() -> f64 { 5.0 }
fn default_sweep_warmup() -> u64 { 300 }
fn default_sweep_measure() -> u64 { 800 }
fn default_phase_step() -> f64 { 0.02 }

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            topology: default_topology(),
            resolution: default_resolution(),
            seed: default_seed(),
            variant: EngineVariant::default(),
            phase: None,
        }
    }
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            avalanche_warmup: default_avalanche_warmup(),
            avalanche_measure: default_avalanche_measure(),
            avalanche_phase: default_avalanche_phase(),
            quiet_period: default_quiet_period(),
            sweep_warmup: default_sweep_warmup(),
            sweep_measure: default_sweep_measure(),
            phase_step: default_phase_step(),
        }
    }
}

impl Config {
    /// Load config from critflux.toml in the current or parent directories.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// User presets in name order.
    pub fn user_presets(&self) -> Vec<Preset> {
        self.presets
            .iter()
            .map(|(name, section)| Preset {
                name: name.clone(),
                variant: section.variant,
                overrides: section
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), *v))
                    .collect(),
            })
            .collect()
    }

    /// User presets followed by the built-ins they do not shadow.
    pub fn all_presets(&self) -> Vec<Preset> {
        let mut presets = self.user_presets();
        for builtin in Preset::builtin() {
            if !presets.iter().any(|p| p.name == builtin.name) {
                presets.push(builtin);
            }
        }
        presets
    }

    /// `[params]` entries as override pairs.
    pub fn overrides(&self) -> Vec<(String, f64)> {
        self.params.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

/// Find critflux.toml in current or parent directories.
fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_round_trips() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.simulation.topology, "lattice");
        assert_eq!(parsed.analysis.avalanche_measure, 4000);
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn partial_files_fill_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [simulation]
            topology = "icosphere"
            variant = "relaxed"

            [params]
            jitter = 0.3

            [presets.calm]
            variant = "relaxed"
            diffusion = 0.05
            sun_strength = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(parsed.simulation.resolution, 4);
        assert_eq!(parsed.simulation.variant, EngineVariant::Relaxed);
        assert_eq!(parsed.analysis.sweep_warmup, 300);
        assert_eq!(parsed.overrides(), vec![("jitter".to_string(), 0.3)]);

        let presets = parsed.user_presets();
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].name, "calm");
        assert_eq!(presets[0].variant, Some(EngineVariant::Relaxed));
        assert_eq!(presets[0].overrides.len(), 2);
        presets[0].params().unwrap();
    }

    #[test]
    fn user_presets_shadow_builtins_in_the_list() {
        let mut config = Config::default();
        config.presets.insert(
            "test-a".into(),
            PresetSection {
                variant: None,
                values: BTreeMap::from([("jitter".to_string(), 0.1)]),
            },
        );
        let names: Vec<String> = config.all_presets().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec!["test-a", "accounted-default", "relaxed-default", "test-b"]
        );
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = Config::default();
        config.simulation.seed = 42;
        config.params.insert("diffusion".into(), 0.1);
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.simulation.seed, 42);
        assert_eq!(loaded.params.get("diffusion"), Some(&0.1));
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[simulation\nseed = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config"));
    }
}
