//! Subdivided icosahedron and its dual.

use super::{check_range, Mesh, TopologyKind, MAX_SUBDIVISIONS};
use crate::error::Result;
use crate::geometry::{cross, dot, lon_lat, normalize, sphere_midpoint, Vec3};
use crate::graph::Adjacency;
use std::collections::HashMap;

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn icosahedron_vertices() -> Vec<Vec3> {
    let t = (1.0 + 5f64.sqrt()) / 2.0;
    [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .into_iter()
    .map(normalize)
    .collect()
}

/// Order-independent key for the edge between two vertex indices.
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Vertices and faces of the icosahedron after `subdivisions` rounds of
/// 1→4 triangle splitting.
fn subdivide(subdivisions: usize) -> (Vec<Vec3>, Vec<[usize; 3]>) {
    let mut vertices = icosahedron_vertices();
    let mut faces = ICOSAHEDRON_FACES.to_vec();

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut next = Vec::with_capacity(faces.len() * 4);

        let mut mid = |a: usize, b: usize, vertices: &mut Vec<Vec3>| -> usize {
            *midpoints.entry(edge_key(a, b)).or_insert_with(|| {
                let m = sphere_midpoint(vertices[a], vertices[b]);
                vertices.push(m);
                vertices.len() - 1
            })
        };

        for &[a, b, c] in &faces {
            let ab = mid(a, b, &mut vertices);
            let bc = mid(b, c, &mut vertices);
            let ca = mid(c, a, &mut vertices);
            next.push([a, ab, ca]);
            next.push([b, bc, ab]);
            next.push([c, ca, bc]);
            next.push([ab, bc, ca]);
        }
        faces = next;
    }

    (vertices, faces)
}

fn lon_lat_columns(positions: &[Vec3]) -> (Vec<f64>, Vec<f64>) {
    positions.iter().map(|&p| lon_lat(p)).unzip()
}

/// Subdivided icosahedron: nodes are vertices, neighbors share a face.
pub fn build_icosphere(subdivisions: usize) -> Result<Mesh> {
    check_range("icosphere subdivisions", subdivisions, 0, MAX_SUBDIVISIONS)?;
    let (vertices, faces) = subdivide(subdivisions);

    let mut adj = Adjacency::with_nodes(vertices.len());
    for &[a, b, c] in &faces {
        adj.link(a, b);
        adj.link(a, c);
        adj.link(b, c);
    }

    let (lons, lats) = lon_lat_columns(&vertices);
    Ok(Mesh {
        kind: TopologyKind::Icosphere,
        positions: vertices,
        neighbors: adj.into_lists(),
        faces,
        polygons: Vec::new(),
        lats,
        lons,
        grid: None,
        lat_period: None,
    })
}

/// Dual of the subdivided icosahedron: one node per face at its normalized
/// centroid; two nodes are neighbors iff their faces share an edge.
///
/// Also emits, for every original vertex, the ring of surrounding face-nodes
/// ordered by signed angle in a tangent frame (the hexagonal and pentagonal
/// cells), plus a fan triangulation of those rings.
pub fn build_hex_sphere(subdivisions: usize) -> Result<Mesh> {
    check_range("hex-sphere subdivisions", subdivisions, 0, MAX_SUBDIVISIONS)?;
    let (vertices, faces) = subdivide(subdivisions);

    let centers: Vec<Vec3> = faces
        .iter()
        .map(|&[a, b, c]| {
            let (va, vb, vc) = (vertices[a], vertices[b], vertices[c]);
            normalize([
                (va[0] + vb[0] + vc[0]) / 3.0,
                (va[1] + vb[1] + vc[1]) / 3.0,
                (va[2] + vb[2] + vc[2]) / 3.0,
            ])
        })
        .collect();

    // First face seen on an edge is recorded; the second links the pair.
    let mut adj = Adjacency::with_nodes(faces.len());
    let mut edge_face: HashMap<(usize, usize), usize> = HashMap::new();
    for (f, tri) in faces.iter().enumerate() {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            match edge_face.get(&edge_key(a, b)) {
                Some(&other) => adj.link(f, other),
                None => {
                    edge_face.insert(edge_key(a, b), f);
                }
            }
        }
    }

    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
    for (f, tri) in faces.iter().enumerate() {
        for &v in tri {
            incident[v].push(f);
        }
    }

    let mut polygons = Vec::with_capacity(vertices.len());
    let mut fan = Vec::new();
    for (v, ring) in incident.iter().enumerate() {
        if ring.len() < 3 {
            continue;
        }
        let ordered = order_around(vertices[v], ring, &centers);
        for k in 1..ordered.len() - 1 {
            fan.push([ordered[0], ordered[k], ordered[k + 1]]);
        }
        polygons.push(ordered);
    }

    let (lons, lats) = lon_lat_columns(&centers);
    Ok(Mesh {
        kind: TopologyKind::HexSphere,
        positions: centers,
        neighbors: adj.into_lists(),
        faces: fan,
        polygons,
        lats,
        lons,
        grid: None,
        lat_period: None,
    })
}

/// Sort face-nodes around `center` by their angle in the local tangent plane.
fn order_around(center: Vec3, ring: &[usize], centers: &[Vec3]) -> Vec<usize> {
    let reference = if center[2].abs() < 0.9 {
        [0.0, 0.0, 1.0]
    } else {
        [0.0, 1.0, 0.0]
    };
    let ux = normalize(cross(reference, center));
    let vx = cross(center, ux);

    let mut angles: Vec<(f64, usize)> = ring
        .iter()
        .map(|&f| {
            let c = centers[f];
            let d = dot(c, center);
            let tangent = [c[0] - center[0] * d, c[1] - center[1] * d, c[2] - center[2] * d];
            (dot(tangent, vx).atan2(dot(tangent, ux)), f)
        })
        .collect();
    angles.sort_by(|a, b| a.0.total_cmp(&b.0));
    angles.into_iter().map(|(_, f)| f).collect()
}
