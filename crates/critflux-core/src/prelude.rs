//! Critflux Core Prelude - convenient imports for common usage.
//!
//! ```rust
//! use critflux_core::prelude::*;
//! ```

pub use crate::topology::{GridDims, Mesh, Topology, TopologyKind, Wrap};

pub use crate::graph::{Adjacency, AdjacencyGraph, DegreeStats};

pub use crate::params::{EngineVariant, ParamSpec, Params, PARAMS};
pub use crate::presets::Preset;

pub use crate::state::FieldState;

pub use crate::error::{ConfigError, CritfluxError, Result, ShapeError, TopologyError};
