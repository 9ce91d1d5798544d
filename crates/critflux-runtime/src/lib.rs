//! # Critflux Runtime
//!
//! Dynamics, diagnostics and batch analysis.
//!
//! The runtime drives a field over a mesh: the step engine advances it one
//! discrete-time update at a time, a [`Simulation`](simulation::Simulation)
//! owns everything one run needs, and the diagnostics and batch drivers turn
//! runs into numbers (correlation lengths, Moran's I, avalanche size
//! distributions).

pub mod engine;
pub mod simulation;
pub mod metrics;
pub mod avalanche;
pub mod batch;
pub mod export;
pub mod prelude;
