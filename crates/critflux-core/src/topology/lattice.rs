//! Grid-shaped topologies: the 4-neighbor lattice, the latitude/longitude
//! grid on the sphere, and the triangulated torus surface.

use super::{GridDims, Mesh, TopologyKind, Wrap, MAX_LATTICE_EXTENT};
use crate::error::{Result, TopologyError};
use crate::graph::Adjacency;
use std::f64::consts::PI;

fn check_extent(axis: &'static str, value: usize, wraps: bool) -> Result<()> {
    // A wrapped axis of two cells would list the same neighbor twice.
    let min = if wraps { 3 } else { 2 };
    if value < min {
        return Err(TopologyError::LatticeTooSmall { axis, value, min }.into());
    }
    if value > MAX_LATTICE_EXTENT {
        return Err(TopologyError::ResolutionOutOfRange {
            kind: axis,
            value,
            min,
            max: MAX_LATTICE_EXTENT,
        }
        .into());
    }
    Ok(())
}

/// Step `v` by `delta` along an axis of length `len`, wrapping or
/// returning `None` past the edge.
fn step_axis(v: usize, delta: isize, len: usize, wraps: bool) -> Option<usize> {
    let next = v as isize + delta;
    if (0..len as isize).contains(&next) {
        Some(next as usize)
    } else if wraps {
        Some(next.rem_euclid(len as isize) as usize)
    } else {
        None
    }
}

/// Regular `height × width` lattice with 4 axis-aligned neighbors, listed
/// left, right, up, down. Unwrapped edges simply lose the missing neighbor.
///
/// Forcing coordinates map rows onto `[-π/2, π/2)` and columns onto
/// `[-π, π)`; when rows wrap, latitude distances wrap with period π.
pub fn build_lattice(height: usize, width: usize, wrap: Wrap) -> Result<Mesh> {
    check_extent("lattice width", width, wrap.wraps_x())?;
    check_extent("lattice height", height, wrap.wraps_y())?;

    let grid = GridDims {
        height,
        width,
        wrap,
    };
    let n = grid.len();
    let mut positions = Vec::with_capacity(n);
    let mut lats = Vec::with_capacity(n);
    let mut lons = Vec::with_capacity(n);
    let mut neighbors = Vec::with_capacity(n);

    for y in 0..height {
        for x in 0..width {
            positions.push([x as f64, y as f64, 0.0]);
            lats.push(y as f64 / height as f64 * PI - PI / 2.0);
            lons.push(x as f64 / width as f64 * 2.0 * PI - PI);

            let mut nb = Vec::with_capacity(4);
            for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                let nx = step_axis(x, dx, width, wrap.wraps_x());
                let ny = step_axis(y, dy, height, wrap.wraps_y());
                if let (Some(nx), Some(ny)) = (nx, ny) {
                    nb.push(grid.index(nx, ny));
                }
            }
            neighbors.push(nb);
        }
    }

    let mut faces = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let (Some(x1), Some(y1)) = (
                step_axis(x, 1, width, wrap.wraps_x()),
                step_axis(y, 1, height, wrap.wraps_y()),
            ) else {
                continue;
            };
            let (a, b) = (grid.index(x, y), grid.index(x1, y));
            let (c, d) = (grid.index(x1, y1), grid.index(x, y1));
            faces.push([a, b, d]);
            faces.push([b, c, d]);
        }
    }

    Ok(Mesh {
        kind: TopologyKind::Lattice,
        positions,
        neighbors,
        faces,
        polygons: Vec::new(),
        lats,
        lons,
        grid: Some(grid),
        lat_period: wrap.wraps_y().then_some(PI),
    })
}

/// Latitude/longitude grid on the unit sphere. Longitude wraps; the pole
/// rows have no neighbor beyond the pole. Neighbors are listed up, down,
/// left, right.
pub fn build_lat_lon_grid(height: usize, width: usize) -> Result<Mesh> {
    check_extent("grid width", width, true)?;
    check_extent("grid height", height, false)?;

    let grid = GridDims {
        height,
        width,
        wrap: Wrap::Horizontal,
    };
    let n = grid.len();
    let mut positions = Vec::with_capacity(n);
    let mut lats = Vec::with_capacity(n);
    let mut lons = Vec::with_capacity(n);
    let mut neighbors = Vec::with_capacity(n);

    for y in 0..height {
        let lat = y as f64 / (height - 1) as f64 * PI - PI / 2.0;
        let (sin_lat, cos_lat) = lat.sin_cos();
        for x in 0..width {
            let lon = x as f64 / width as f64 * 2.0 * PI - PI;
            let (sin_lon, cos_lon) = lon.sin_cos();
            positions.push([cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]);
            lats.push(lat);
            lons.push(lon);

            let mut nb = Vec::with_capacity(4);
            if y > 0 {
                nb.push(grid.index(x, y - 1));
            }
            if y + 1 < height {
                nb.push(grid.index(x, y + 1));
            }
            nb.push(grid.index((x + width - 1) % width, y));
            nb.push(grid.index((x + 1) % width, y));
            neighbors.push(nb);
        }
    }

    let mut faces = Vec::new();
    for y in 0..height - 1 {
        for x in 0..width {
            let x1 = (x + 1) % width;
            let (a, b) = (grid.index(x, y), grid.index(x1, y));
            let (c, d) = (grid.index(x1, y + 1), grid.index(x, y + 1));
            faces.push([a, b, d]);
            faces.push([b, c, d]);
        }
    }

    Ok(Mesh {
        kind: TopologyKind::LatLonGrid,
        positions,
        neighbors,
        faces,
        polygons: Vec::new(),
        lats,
        lons,
        grid: Some(grid),
        lat_period: None,
    })
}

/// Triangulated torus surface. Each quad is split along one diagonal, so
/// every node has six neighbors (the face-sharing vertices).
pub fn build_torus(
    segments_u: usize,
    segments_v: usize,
    major_radius: f64,
    minor_radius: f64,
) -> Result<Mesh> {
    check_extent("torus segments_u", segments_u, true)?;
    check_extent("torus segments_v", segments_v, true)?;
    if !(minor_radius > 0.0 && major_radius > minor_radius && major_radius.is_finite()) {
        return Err(TopologyError::InvalidRadii {
            major: major_radius,
            minor: minor_radius,
        }
        .into());
    }

    let grid = GridDims {
        height: segments_v,
        width: segments_u,
        wrap: Wrap::Both,
    };
    let n = grid.len();
    let mut positions = Vec::with_capacity(n);
    let mut lats = Vec::with_capacity(n);
    let mut lons = Vec::with_capacity(n);

    for v in 0..segments_v {
        let phi = v as f64 / segments_v as f64 * 2.0 * PI;
        let (sin_p, cos_p) = phi.sin_cos();
        for u in 0..segments_u {
            let theta = u as f64 / segments_u as f64 * 2.0 * PI;
            let (sin_t, cos_t) = theta.sin_cos();
            let ring = major_radius + minor_radius * cos_p;
            positions.push([ring * cos_t, ring * sin_t, minor_radius * sin_p]);
            lons.push(theta - PI);
            lats.push((phi - PI) / 2.0);
        }
    }

    let mut faces = Vec::with_capacity(n * 2);
    for v in 0..segments_v {
        for u in 0..segments_u {
            let u1 = (u + 1) % segments_u;
            let v1 = (v + 1) % segments_v;
            let (a, b) = (grid.index(u, v), grid.index(u1, v));
            let (c, d) = (grid.index(u1, v1), grid.index(u, v1));
            faces.push([a, b, d]);
            faces.push([b, c, d]);
        }
    }

    let mut adj = Adjacency::with_nodes(n);
    for &[a, b, c] in &faces {
        adj.link(a, b);
        adj.link(a, c);
        adj.link(b, c);
    }

    Ok(Mesh {
        kind: TopologyKind::Torus,
        positions,
        neighbors: adj.into_lists(),
        faces,
        polygons: Vec::new(),
        lats,
        lons,
        grid: Some(grid),
        lat_period: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AdjacencyGraph;

    #[test]
    fn torus_lattice_is_four_regular() {
        let mesh = build_lattice(5, 7, Wrap::Both).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_connected());
        let stats = mesh.degree_stats();
        assert_eq!((stats.min, stats.max), (4, 4));
        assert_eq!(mesh.lat_period, Some(PI));
    }

    #[test]
    fn lattice_neighbor_order_is_left_right_up_down() {
        let mesh = build_lattice(4, 5, Wrap::Both).unwrap();
        let grid = mesh.grid.unwrap();
        assert_eq!(
            mesh.neighbors(grid.index(0, 0)),
            &[grid.index(4, 0), grid.index(1, 0), grid.index(0, 3), grid.index(0, 1)]
        );
    }

    #[test]
    fn bounded_lattice_loses_edge_degree() {
        let mesh = build_lattice(3, 4, Wrap::None).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_connected());
        let grid = mesh.grid.unwrap();
        assert_eq!(mesh.degree(grid.index(0, 0)), 2);
        assert_eq!(mesh.degree(grid.index(1, 0)), 3);
        assert_eq!(mesh.degree(grid.index(1, 1)), 4);
        assert_eq!(mesh.edge_count(), 3 * 3 + 2 * 4);
        assert_eq!(mesh.lat_period, None);
    }

    #[test]
    fn cylinder_wraps_only_horizontally() {
        let mesh = build_lattice(3, 4, Wrap::Horizontal).unwrap();
        let grid = mesh.grid.unwrap();
        assert_eq!(mesh.degree(grid.index(0, 0)), 3);
        assert!(mesh.neighbors(grid.index(0, 0)).contains(&grid.index(3, 0)));
    }

    #[test]
    fn rejects_degenerate_wrapped_axes() {
        assert!(matches!(
            build_lattice(2, 10, Wrap::Both),
            Err(crate::error::CritfluxError::Topology(TopologyError::LatticeTooSmall { .. }))
        ));
        assert!(build_lattice(2, 10, Wrap::Horizontal).is_ok());
        assert!(build_lattice(1, 10, Wrap::None).is_err());
    }

    #[test]
    fn lat_lon_grid_has_no_polar_self_loops() {
        let mesh = build_lat_lon_grid(6, 12).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_connected());
        let grid = mesh.grid.unwrap();
        assert_eq!(mesh.degree(grid.index(0, 0)), 3);
        assert_eq!(mesh.degree(grid.index(0, 2)), 4);
        assert!((mesh.lats[grid.index(0, 5)] - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn torus_surface_is_six_regular() {
        let mesh = build_torus(8, 6, 1.1, 0.45).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_connected());
        let stats = mesh.degree_stats();
        assert_eq!((stats.min, stats.max), (6, 6));
        assert_eq!(mesh.faces.len(), 2 * 48);
    }

    #[test]
    fn torus_rejects_bad_radii() {
        assert!(build_torus(8, 6, 0.4, 0.45).is_err());
        assert!(build_torus(8, 6, 1.0, 0.0).is_err());
    }
}
