//! Field state - the per-node energy, information and structure arrays.

use crate::error::{CritfluxError, Result, ShapeError};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Amplitude of each centered uniform draw in the initial energy field.
pub const INITIAL_ENERGY_JITTER: f64 = 0.02;

/// Mutable simulation state, one instance per run.
///
/// Invariant after every step: `info[i] >= 0` and `structure[i]` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    /// Energy. Unbounded; may go transiently negative.
    pub energy: Vec<f64>,
    /// Information. Never negative.
    pub info: Vec<f64>,
    /// Structure in `[0, 1]`.
    pub structure: Vec<f64>,
    /// Simulation time, advanced by `dt` per step by the driver.
    pub time: f64,
    /// Seed of the last reset.
    pub seed: u64,
    #[serde(skip)]
    pub scratch: Scratch,
}

/// Per-step work buffers. Recomputed every step, never part of the state
/// proper; kept here so steps do not reallocate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scratch {
    pub d_energy: Vec<f64>,
    pub d_info: Vec<f64>,
    pub flux: Vec<f64>,
    pub slow: Vec<f64>,
}

impl Scratch {
    fn with_len(n: usize) -> Self {
        Self {
            d_energy: vec![0.0; n],
            d_info: vec![0.0; n],
            flux: vec![0.0; n],
            slow: vec![0.0; n],
        }
    }

    /// Zero every buffer, resizing to `n` if the state was replaced.
    pub fn clear(&mut self, n: usize) {
        for buf in [
            &mut self.d_energy,
            &mut self.d_info,
            &mut self.flux,
            &mut self.slow,
        ] {
            buf.clear();
            buf.resize(n, 0.0);
        }
    }
}

impl FieldState {
    /// Create a state of `n` nodes seeded from `seed`.
    pub fn new(n: usize, seed: u64) -> Result<Self> {
        if n == 0 {
            return Err(ShapeError::Empty.into());
        }
        let mut state = Self {
            energy: vec![0.0; n],
            info: vec![0.0; n],
            structure: vec![0.0; n],
            time: 0.0,
            seed,
            scratch: Scratch::with_len(n),
        };
        state.reset(seed);
        Ok(state)
    }

    /// Assemble a state from explicit fields, e.g. a hand-built scenario.
    pub fn from_fields(energy: Vec<f64>, info: Vec<f64>, structure: Vec<f64>) -> Result<Self> {
        let n = energy.len();
        if n == 0 {
            return Err(ShapeError::Empty.into());
        }
        if info.len() != n {
            return Err(CritfluxError::length_mismatch("info", n, info.len()));
        }
        if structure.len() != n {
            return Err(CritfluxError::length_mismatch("structure", n, structure.len()));
        }
        Ok(Self {
            energy,
            info,
            structure,
            time: 0.0,
            seed: 0,
            scratch: Scratch::with_len(n),
        })
    }

    /// Reinitialize in place from `seed` without reallocating.
    ///
    /// `I` and `S` are zeroed; each `E[i]` gets two summed centered uniform
    /// draws so the field starts near-homogeneous but not symmetric.
    /// Deterministic and idempotent for a fixed seed.
    pub fn reset(&mut self, seed: u64) {
        let mut rng = SmallRng::seed_from_u64(seed);
        for e in self.energy.iter_mut() {
            let a = rng.gen::<f64>() - 0.5;
            let b = rng.gen::<f64>() - 0.5;
            *e = INITIAL_ENERGY_JITTER * a + INITIAL_ENERGY_JITTER * b;
        }
        self.info.iter_mut().for_each(|v| *v = 0.0);
        self.structure.iter_mut().for_each(|v| *v = 0.0);
        self.time = 0.0;
        self.seed = seed;
        let n = self.energy.len();
        self.scratch.clear(n);
    }

    pub fn len(&self) -> usize {
        self.energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Check that all three fields have the same length, and that it
    /// matches `expected`.
    pub fn check_len(&self, expected: usize) -> Result<()> {
        for (what, len) in [
            ("energy", self.energy.len()),
            ("info", self.info.len()),
            ("structure", self.structure.len()),
        ] {
            if len != expected {
                return Err(CritfluxError::length_mismatch(what, expected, len));
            }
        }
        Ok(())
    }

    pub fn total_energy(&self) -> f64 {
        self.energy.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_quiet_but_not_uniform() {
        let state = FieldState::new(500, 7).unwrap();
        assert!(state.info.iter().all(|&v| v == 0.0));
        assert!(state.structure.iter().all(|&v| v == 0.0));
        assert!(state
            .energy
            .iter()
            .all(|&e| e.abs() <= INITIAL_ENERGY_JITTER));
        let first = state.energy[0];
        assert!(state.energy.iter().any(|&e| e != first));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut state = FieldState::new(64, 3).unwrap();
        state.energy[5] = 10.0;
        state.info[2] = 1.0;
        state.time = 42.0;
        state.reset(3);
        let first = state.clone();
        state.reset(3);
        assert_eq!(state, first);
        assert_eq!(first, FieldState::new(64, 3).unwrap());
    }

    #[test]
    fn seeds_differ() {
        let a = FieldState::new(32, 1).unwrap();
        let b = FieldState::new(32, 2).unwrap();
        assert_ne!(a.energy, b.energy);
    }

    #[test]
    fn rejects_empty_and_ragged_fields() {
        assert!(FieldState::new(0, 1).is_err());
        assert!(FieldState::from_fields(vec![0.0; 3], vec![0.0; 2], vec![0.0; 3]).is_err());
        let state = FieldState::from_fields(vec![0.0; 3], vec![0.0; 3], vec![0.0; 3]).unwrap();
        assert!(state.check_len(4).is_err());
        state.check_len(3).unwrap();
    }
}
