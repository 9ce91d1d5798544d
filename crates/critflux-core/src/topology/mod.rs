//! Topology builders - node positions plus a symmetric neighbor list.
//!
//! Each [`Topology`] arm is an independent pure builder returning the same
//! [`Mesh`] shape. A mesh is built once per topology/resolution change and
//! is immutable afterwards; share it behind an `Arc` across simulations.
//!
//! | kind | nodes | degree |
//! |------|-------|--------|
//! | `Icosphere` | `10·4^s + 2` | 5–6 |
//! | `HexSphere` | `20·4^s` | 3 |
//! | `Fibonacci` | `max(12, count)` | ≈6 |
//! | `Lattice` | `H·W` | 4 (fewer on unwrapped edges) |
//! | `LatLonGrid` | `H·W` | 3–4 |
//! | `Torus` | `U·V` | 6 |

mod fibonacci;
mod icosphere;
mod lattice;

pub use fibonacci::build_fibonacci;
pub use icosphere::{build_hex_sphere, build_icosphere};
pub use lattice::{build_lat_lon_grid, build_lattice, build_torus};

use crate::error::{CritfluxError, Result, TopologyError};
use crate::geometry::Vec3;
use crate::graph::{self, AdjacencyGraph, DegreeStats};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deepest icosphere subdivision accepted (10·4^7 + 2 ≈ 164k nodes).
pub const MAX_SUBDIVISIONS: usize = 7;
/// Largest point count accepted for the spiral sampling.
pub const MAX_FIBONACCI_POINTS: usize = 200_000;
/// Largest lattice extent accepted on either axis.
pub const MAX_LATTICE_EXTENT: usize = 4096;

/// Which lattice axes wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wrap {
    /// Both axes wrap: a torus.
    Both,
    /// Only the x axis wraps: a cylinder.
    Horizontal,
    /// Neither axis wraps: boundary nodes lose degree.
    None,
}

impl Wrap {
    pub fn wraps_x(self) -> bool {
        matches!(self, Wrap::Both | Wrap::Horizontal)
    }

    pub fn wraps_y(self) -> bool {
        matches!(self, Wrap::Both)
    }
}

/// Grid dimensions carried by lattice-shaped meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub height: usize,
    pub width: usize,
    pub wrap: Wrap,
}

impl GridDims {
    /// Row-major node index of cell `(x, y)`.
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn len(&self) -> usize {
        self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A requested topology and its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    Icosphere {
        subdivisions: usize,
    },
    HexSphere {
        subdivisions: usize,
    },
    Fibonacci {
        count: usize,
    },
    Lattice {
        height: usize,
        width: usize,
        wrap: Wrap,
    },
    LatLonGrid {
        height: usize,
        width: usize,
    },
    Torus {
        segments_u: usize,
        segments_v: usize,
        major_radius: f64,
        minor_radius: f64,
    },
}

/// Topology family, without size. Used to pick a topology from a single
/// resolution knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyKind {
    Icosphere,
    HexSphere,
    Fibonacci,
    Lattice,
    LatLonGrid,
    Torus,
}

impl TopologyKind {
    pub const ALL: [TopologyKind; 6] = [
        TopologyKind::Icosphere,
        TopologyKind::HexSphere,
        TopologyKind::Fibonacci,
        TopologyKind::Lattice,
        TopologyKind::LatLonGrid,
        TopologyKind::Torus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TopologyKind::Icosphere => "icosphere",
            TopologyKind::HexSphere => "hex-sphere",
            TopologyKind::Fibonacci => "fibonacci",
            TopologyKind::Lattice => "lattice",
            TopologyKind::LatLonGrid => "lat-lon-grid",
            TopologyKind::Torus => "torus",
        }
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TopologyKind {
    type Err = CritfluxError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        let alias = match wanted.as_str() {
            "sphere" => "icosphere",
            "hex" => "hex-sphere",
            "points" => "fibonacci",
            "grid" => "lat-lon-grid",
            other => other,
        };
        TopologyKind::ALL
            .into_iter()
            .find(|k| k.name() == alias)
            .ok_or_else(|| TopologyError::UnknownKind(s.to_string()).into())
    }
}

impl Topology {
    pub fn kind(&self) -> TopologyKind {
        match self {
            Topology::Icosphere { .. } => TopologyKind::Icosphere,
            Topology::HexSphere { .. } => TopologyKind::HexSphere,
            Topology::Fibonacci { .. } => TopologyKind::Fibonacci,
            Topology::Lattice { .. } => TopologyKind::Lattice,
            Topology::LatLonGrid { .. } => TopologyKind::LatLonGrid,
            Topology::Torus { .. } => TopologyKind::Torus,
        }
    }

    /// Derive a concrete size from a single resolution level.
    ///
    /// Sphere meshes use the level as the subdivision depth; the other
    /// kinds grow linearly with it and are clamped to sane extents.
    pub fn from_resolution(kind: TopologyKind, resolution: usize) -> Topology {
        let r = resolution;
        match kind {
            TopologyKind::Icosphere => Topology::Icosphere { subdivisions: r },
            TopologyKind::HexSphere => Topology::HexSphere { subdivisions: r },
            TopologyKind::Fibonacci => Topology::Fibonacci {
                count: (800 + r * 1600).clamp(600, 5000),
            },
            TopologyKind::Lattice => Topology::Lattice {
                height: (26 * (r + 1)).clamp(26, 520),
                width: (36 * (r + 1)).clamp(36, 720),
                wrap: Wrap::Both,
            },
            TopologyKind::LatLonGrid => Topology::LatLonGrid {
                height: (48 + r * 16).clamp(48, 192),
                width: (96 + r * 32).clamp(96, 384),
            },
            TopologyKind::Torus => Topology::Torus {
                segments_u: (24 + r * 10).clamp(16, 120),
                segments_v: (16 + r * 8).clamp(12, 96),
                major_radius: 1.1,
                minor_radius: 0.45,
            },
        }
    }

    /// Build the mesh, rejecting malformed requests and any result that is
    /// not a connected, symmetric, loop-free graph.
    pub fn build(&self) -> Result<Mesh> {
        let mesh = match *self {
            Topology::Icosphere { subdivisions } => build_icosphere(subdivisions)?,
            Topology::HexSphere { subdivisions } => build_hex_sphere(subdivisions)?,
            Topology::Fibonacci { count } => build_fibonacci(count)?,
            Topology::Lattice {
                height,
                width,
                wrap,
            } => build_lattice(height, width, wrap)?,
            Topology::LatLonGrid { height, width } => build_lat_lon_grid(height, width)?,
            Topology::Torus {
                segments_u,
                segments_v,
                major_radius,
                minor_radius,
            } => build_torus(segments_u, segments_v, major_radius, minor_radius)?,
        };
        mesh.validate()?;
        let components = mesh.component_count();
        if components > 1 {
            return Err(TopologyError::Disconnected { components }.into());
        }
        Ok(mesh)
    }
}

/// Builder output: positions, neighbor lists and forcing coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub kind: TopologyKind,
    /// Node positions. Unit vectors on sphere meshes; `(x, y, 0)` on lattices.
    pub positions: Vec<Vec3>,
    /// Symmetric neighbor lists in construction order.
    pub neighbors: Vec<Vec<usize>>,
    /// Triangles for display consumers.
    pub faces: Vec<[usize; 3]>,
    /// Hex-sphere cells: face-nodes around each original vertex, ordered by angle.
    pub polygons: Vec<Vec<usize>>,
    /// Per-node latitude in radians, fed to the forcing band.
    pub lats: Vec<f64>,
    /// Per-node longitude in radians.
    pub lons: Vec<f64>,
    /// Present on lattice-shaped meshes.
    pub grid: Option<GridDims>,
    /// Period of the latitude coordinate when it wraps (vertically wrapped lattices).
    pub lat_period: Option<f64>,
}

impl Mesh {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check graph invariants and per-node array lengths.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        for (what, len) in [
            ("neighbors", self.neighbors.len()),
            ("lats", self.lats.len()),
            ("lons", self.lons.len()),
        ] {
            if len != n {
                return Err(CritfluxError::length_mismatch(what, n, len));
            }
        }
        if let Some(grid) = self.grid {
            if grid.len() != n {
                return Err(CritfluxError::length_mismatch("grid cells", n, grid.len()));
            }
        }
        graph::validate_lists(&self.neighbors)
    }

    pub fn component_count(&self) -> usize {
        graph::component_count(self)
    }

    pub fn is_connected(&self) -> bool {
        self.component_count() <= 1
    }

    pub fn degree_stats(&self) -> DegreeStats {
        graph::degree_stats(self)
    }

    /// Grid dimensions, or an error for non-lattice meshes.
    pub fn require_grid(&self) -> Result<GridDims> {
        self.grid
            .ok_or_else(|| CritfluxError::not_a_lattice(self.kind.name()))
    }
}

impl AdjacencyGraph for Mesh {
    fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }
}

pub(crate) fn check_range(
    kind: &'static str,
    value: usize,
    min: usize,
    max: usize,
) -> Result<()> {
    if value < min || value > max {
        return Err(TopologyError::ResolutionOutOfRange {
            kind,
            value,
            min,
            max,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_names_and_aliases() {
        assert_eq!("hex".parse::<TopologyKind>().unwrap(), TopologyKind::HexSphere);
        assert_eq!("Lat_Lon_Grid".parse::<TopologyKind>().unwrap(), TopologyKind::LatLonGrid);
        assert_eq!("torus".parse::<TopologyKind>().unwrap(), TopologyKind::Torus);
        assert!("klein-bottle".parse::<TopologyKind>().is_err());
    }

    #[test]
    fn every_kind_builds_from_a_low_resolution() {
        for kind in TopologyKind::ALL {
            let mesh = Topology::from_resolution(kind, 1).build().unwrap();
            assert_eq!(mesh.kind, kind);
            assert!(mesh.is_connected(), "{kind} mesh is disconnected");
        }
    }

    #[test]
    fn require_grid_rejects_spheres() {
        let mesh = Topology::Icosphere { subdivisions: 1 }.build().unwrap();
        assert!(mesh.require_grid().is_err());
        let mesh = Topology::Lattice { height: 4, width: 5, wrap: Wrap::Both }
            .build()
            .unwrap();
        assert_eq!(mesh.require_grid().unwrap().width, 5);
    }
}
