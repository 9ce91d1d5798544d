//! # Critflux Core
//!
//! Topologies, parameters and field state for self-organized criticality
//! simulations.
//!
//! This crate holds everything a simulation is assembled from, but none of
//! the dynamics:
//!
//! - **Topology** - builders for lattices, sphere meshes and point graphs,
//!   all producing the same [`Mesh`](topology::Mesh) shape
//! - **Graph** - the [`AdjacencyGraph`](graph::AdjacencyGraph) view the
//!   engine and diagnostics see, plus validation and connectivity checks
//! - **Params** - the named, bounded knobs, the two engine variants and the
//!   single-scalar phase projection
//! - **Presets** - named override dictionaries
//! - **State** - the per-node energy, information and structure arrays
//!
//! ## Quick Start
//!
//! ```rust
//! use critflux_core::prelude::*;
//!
//! // A 26×36 torus lattice
//! let mesh = Topology::Lattice { height: 26, width: 36, wrap: Wrap::Both }
//!     .build()
//!     .unwrap();
//! assert_eq!(mesh.len(), 26 * 36);
//!
//! // Parameters derived from a phase, then a direct override
//! let mut params = Params::from_phase(EngineVariant::Accounted, 0.7);
//! params.set("jitter", 0.5).unwrap();
//!
//! let state = FieldState::new(mesh.len(), 1).unwrap();
//! assert!(state.info.iter().all(|&i| i == 0.0));
//! ```

pub mod error;
pub mod geometry;
pub mod graph;
pub mod params;
pub mod presets;
pub mod state;
pub mod topology;
pub mod prelude;
