//! Critflux Runtime Prelude - convenient imports for common usage.
//!
//! ```rust
//! use critflux_runtime::prelude::*;
//! ```

// Re-export the engine and simulation context
pub use crate::engine::{step, step_mesh, Forcing, StepReport};
pub use crate::simulation::{FieldsMut, RunTotals, Simulation, SimulationConfig};

// Re-export diagnostics
pub use crate::avalanche::{Avalanche, AvalancheAnalysis, AvalancheDetector};
pub use crate::metrics::{
    cluster_stats, correlation_length, moran_i, structure_metrics, ClusterStats, FieldSummary,
    Regime, StructureMetrics,
};

// Re-export batch drivers
pub use crate::batch::{
    run_avalanche, run_sweep, sweep_csv, AvalancheConfig, AvalancheReport, ParamSource,
    SweepConfig, SweepMode, SweepRow,
};

// Re-export snapshot export
pub use crate::export::{FieldStats, SimulationSnapshot};

// Re-export from core
pub use critflux_core::prelude::*;
