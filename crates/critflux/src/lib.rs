//! # Critflux
//!
//! Self-organized criticality on lattices and sphere meshes.
//!
//! Critflux drives three coupled per-node fields over an undirected graph:
//! energy `E` is injected by a moving forcing band and spreads by
//! diffusion, information `I` accrues where energy flux is high, and
//! structure `S` grows with hysteresis where information persists. Nodes
//! whose information passes a threshold collapse, releasing energy into
//! their neighbors and setting off avalanches whose size distribution is
//! the system's signature.
//!
//! ## Quick Start
//!
//! ```rust
//! use critflux::prelude::*;
//! use std::sync::Arc;
//!
//! // Build a mesh once; simulations share it
//! let mesh = Arc::new(Topology::Icosphere { subdivisions: 2 }.build().unwrap());
//!
//! // A relaxed-variant simulation with a phase-derived parameter set
//! let params = Params::from_phase(EngineVariant::Relaxed, 0.7);
//! let mut sim = Simulation::new(mesh, params, 1).unwrap();
//!
//! // Advance and inspect
//! let report = sim.run(200);
//! println!("collapses: {}, released: {:.3}", report.collapse_count, report.release_sum);
//!
//! let summary = sim.summary();
//! assert!(summary.mean_structure >= 0.0 && summary.mean_structure <= 1.0);
//! ```
//!
//! ## Architecture
//!
//! - [`critflux_core`] - Topologies, the adjacency-graph view, parameters,
//!   presets and field state
//! - [`critflux_runtime`] - Step engine, simulation context, diagnostics
//!   and batch analysis
//!
//! ## Engine Variants
//!
//! | Variant | Structure | Information cost | Collapse |
//! |---------|-----------|------------------|----------|
//! | Accounted | Paid for out of local energy | Limited by affordability | `I` drops by the energy released |
//! | Relaxed | Fixed increment, free | Unconditional | `I` keeps a fixed remainder |
//!
//! ## Avalanche Analysis
//!
//! ```rust
//! use critflux::prelude::*;
//! use std::sync::Arc;
//!
//! let mesh = Arc::new(
//!     Topology::Lattice { height: 32, width: 32, wrap: Wrap::Both }.build().unwrap(),
//! );
//! let mut sim = Simulation::new(mesh, Params::accounted(), 1).unwrap();
//!
//! let config = AvalancheConfig::new(100, 400).with_source(ParamSource::Phase(0.7));
//! let report = run_avalanche(&mut sim, &config).unwrap();
//! print!("{}", report.to_table());
//! ```

// Re-export all subcrates
pub use critflux_core as core;
pub use critflux_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust
/// use critflux::prelude::*;
/// ```
pub mod prelude {
    pub use critflux_runtime::prelude::*;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
