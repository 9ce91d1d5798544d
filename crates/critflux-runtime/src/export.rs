//! Snapshot export for display consumers.
//!
//! A snapshot carries the mesh geometry and the three fields at one
//! instant as plain JSON. It is a read-only view for renderers and
//! notebooks, not a format a simulation can be restored from.

use crate::metrics::FieldSummary;
use crate::simulation::Simulation;
use critflux_core::geometry::Vec3;
use critflux_core::params::Params;
use critflux_core::topology::{GridDims, TopologyKind};
use serde::Serialize;

/// Geometry and fields at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSnapshot {
    pub kind: TopologyKind,
    pub time: f64,
    pub steps: u64,
    pub seed: u64,
    pub params: Params,
    pub positions: Vec<Vec3>,
    pub neighbors: Vec<Vec<usize>>,
    pub faces: Vec<[usize; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub polygons: Vec<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridDims>,
    pub energy: Vec<f64>,
    pub info: Vec<f64>,
    pub structure: Vec<f64>,
    pub summary: FieldSummary,
    pub stats: SnapshotStats,
}

/// Per-field distribution summaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotStats {
    pub energy: FieldStats,
    pub info: FieldStats,
    pub structure: FieldStats,
}

/// Min, max, mean and median of one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl FieldStats {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: sorted[sorted.len() / 2],
        }
    }
}

impl Simulation {
    /// Capture geometry, fields and summaries at the current instant.
    pub fn snapshot(&self) -> SimulationSnapshot {
        let mesh = self.mesh();
        let state = self.state();
        SimulationSnapshot {
            kind: mesh.kind,
            time: state.time,
            steps: self.totals().steps,
            seed: state.seed,
            params: self.params().clone(),
            positions: mesh.positions.clone(),
            neighbors: mesh.neighbors.clone(),
            faces: mesh.faces.clone(),
            polygons: mesh.polygons.clone(),
            grid: mesh.grid,
            energy: state.energy.clone(),
            info: state.info.clone(),
            structure: state.structure.clone(),
            summary: self.summary(),
            stats: SnapshotStats {
                energy: FieldStats::of(&state.energy),
                info: FieldStats::of(&state.info),
                structure: FieldStats::of(&state.structure),
            },
        }
    }
}

/// Serialize a snapshot to JSON, pretty-printed when `pretty` is set.
pub fn to_json(snapshot: &SimulationSnapshot, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(snapshot)
    } else {
        serde_json::to_string(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critflux_core::topology::Topology;
    use std::sync::Arc;

    #[test]
    fn field_stats_median_is_upper_middle() {
        let stats = FieldStats::of(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 3.0);
        assert_eq!(FieldStats::of(&[]), FieldStats::default());
    }

    #[test]
    fn snapshot_json_has_display_fields() {
        let mesh = Arc::new(Topology::HexSphere { subdivisions: 1 }.build().unwrap());
        let mut sim = Simulation::new(mesh, Params::relaxed(), 3).unwrap();
        sim.run(5);
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.steps, 5);
        assert_eq!(snapshot.energy.len(), snapshot.positions.len());

        let json = to_json(&snapshot, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "hex-sphere");
        assert!(value["polygons"].as_array().is_some_and(|p| !p.is_empty()));
        assert!(value.get("grid").is_none());
        assert_eq!(value["params"]["variant"], "relaxed");
        let params: Params = serde_json::from_value(value["params"].clone()).unwrap();
        assert_eq!(&params, sim.params());
    }
}
