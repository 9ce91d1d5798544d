//! Error types for critflux operations.
//!
//! Errors only arise at construction boundaries: building a topology,
//! pairing a state with a graph, or configuring parameters. Once a
//! simulation is assembled, stepping it cannot fail.

use thiserror::Error;

/// Result type for critflux operations.
pub type Result<T> = std::result::Result<T, CritfluxError>;

/// Errors that can occur while assembling a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CritfluxError {
    /// Topology-related errors.
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
    /// Array-length mismatch between state, graph and coordinates.
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),
    /// Parameter and preset errors.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Invalid topology requests and malformed graphs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("{kind} resolution {value} is out of range (must be {min}-{max})")]
    ResolutionOutOfRange {
        kind: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("{axis} extent {value} is too small (needs at least {min} cells)")]
    LatticeTooSmall {
        axis: &'static str,
        value: usize,
        min: usize,
    },

    #[error("Invalid torus radii: major={major}, minor={minor}")]
    InvalidRadii { major: f64, minor: f64 },

    #[error("Node {node} lists itself as a neighbor")]
    SelfLoop { node: usize },

    #[error("Node {node} lists neighbor {neighbor} more than once")]
    DuplicateNeighbor { node: usize, neighbor: usize },

    #[error("Edge {from} -> {to} has no reverse edge")]
    Asymmetric { from: usize, to: usize },

    #[error("Node {node} references neighbor {neighbor} outside 0..{count}")]
    NeighborOutOfRange {
        node: usize,
        neighbor: usize,
        count: usize,
    },

    #[error("Graph is disconnected ({components} components)")]
    Disconnected { components: usize },

    #[error("Operation requires a lattice topology, got {0}")]
    NotALattice(String),

    #[error("Unknown topology kind: {0}")]
    UnknownKind(String),
}

/// Caller contract violations: arrays that should line up but do not.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("{what} has length {found}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Field state is empty")]
    Empty,
}

/// Parameter, preset and phase errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("{field} out of range: {value} (must be {min}-{max})")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} is not a finite number")]
    NotFinite { field: String },

    #[error("Hysteresis band inverted: sigma_off={off} exceeds sigma_on={on}")]
    InvertedHysteresis { on: f64, off: f64 },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown engine variant: {0}")]
    UnknownVariant(String),
}

// Convenience constructors
impl CritfluxError {
    pub fn length_mismatch(what: &'static str, expected: usize, found: usize) -> Self {
        CritfluxError::Shape(ShapeError::LengthMismatch {
            what,
            expected,
            found,
        })
    }

    pub fn unknown_parameter(name: impl Into<String>) -> Self {
        CritfluxError::Config(ConfigError::UnknownParameter(name.into()))
    }

    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64, value: f64) -> Self {
        CritfluxError::Config(ConfigError::OutOfRange {
            field: field.into(),
            min,
            max,
            value,
        })
    }

    pub fn not_a_lattice(kind: impl Into<String>) -> Self {
        CritfluxError::Topology(TopologyError::NotALattice(kind.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = CritfluxError::out_of_range("diffusion", 0.0, 0.5, 0.9);
        assert_eq!(
            err.to_string(),
            "Config error: diffusion out of range: 0.9 (must be 0-0.5)"
        );

        let err = CritfluxError::length_mismatch("lats", 12, 10);
        assert_eq!(err.to_string(), "Shape error: lats has length 10, expected 12");
    }

    #[test]
    fn nested_errors_convert() {
        let err: CritfluxError = TopologyError::SelfLoop { node: 3 }.into();
        assert!(matches!(err, CritfluxError::Topology(TopologyError::SelfLoop { node: 3 })));
    }
}
