//! Quasi-uniform sphere sampling along a golden-angle spiral, wired as a
//! symmetrized k-nearest-neighbor graph.

use super::{check_range, Mesh, TopologyKind, MAX_FIBONACCI_POINTS};
use crate::error::Result;
use crate::geometry::{dot, Vec3};
use crate::graph::{component_labels, Adjacency};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Nearest neighbors taken per point before symmetrizing.
pub const NEAREST_K: usize = 6;
/// Fewest points a spiral is built with.
pub const MIN_POINTS: usize = 12;

/// Place `count` points (at least [`MIN_POINTS`]) on a golden-angle spiral
/// and connect each to its [`NEAREST_K`] nearest neighbors.
///
/// The symmetrized kNN graph can split into islands, both on sparse
/// spirals and on dense ones. Each island is joined to its nearest node
/// outside it until the graph is connected.
pub fn build_fibonacci(count: usize) -> Result<Mesh> {
    check_range("fibonacci points", count, 1, MAX_FIBONACCI_POINTS)?;
    let n = count.max(MIN_POINTS);
    let golden_angle = PI * (3.0 - 5f64.sqrt());

    let mut positions = Vec::with_capacity(n);
    let mut lats = Vec::with_capacity(n);
    let mut lons = Vec::with_capacity(n);
    for i in 0..n {
        let t = (i as f64 + 0.5) / n as f64;
        let z = 1.0 - 2.0 * t;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = i as f64 * golden_angle;
        let (x, y) = (phi.cos() * r, phi.sin() * r);
        positions.push([x, y, z]);
        lons.push(y.atan2(x));
        lats.push(z.asin());
    }

    let bins = Bins::new(&lats, &lons);
    let mut adj = binned_nearest(&bins, &positions, &lats, &lons, NEAREST_K);
    bridge_components(&bins, &positions, &lats, &lons, &mut adj);
    Ok(Mesh {
        kind: TopologyKind::Fibonacci,
        positions,
        neighbors: adj.into_lists(),
        faces: Vec::new(),
        polygons: Vec::new(),
        lats,
        lons,
        grid: None,
        lat_period: None,
    })
}

/// Latitude/longitude bucket grid bounding the nearest-neighbor search to
/// the 3×3 block of bins around each point. Longitude wraps; latitude
/// clamps at the poles.
struct Bins {
    lat_bins: usize,
    lon_bins: usize,
    cells: Vec<Vec<usize>>,
}

impl Bins {
    fn new(lats: &[f64], lons: &[f64]) -> Self {
        let n = lats.len();
        let lat_bins = ((n as f64 / 6.0).sqrt().floor() as usize).max(8);
        let lon_bins = lat_bins * 2;
        let mut bins = Self {
            lat_bins,
            lon_bins,
            cells: vec![Vec::new(); lat_bins * lon_bins],
        };
        for i in 0..n {
            let cell = bins.cell(bins.lat_bin(lats[i]), bins.lon_bin(lons[i]));
            bins.cells[cell].push(i);
        }
        bins
    }

    fn lat_bin(&self, lat: f64) -> usize {
        let u = (lat + PI / 2.0) / PI;
        clamp_bin(u * self.lat_bins as f64, self.lat_bins)
    }

    fn lon_bin(&self, lon: f64) -> usize {
        let u = (lon + PI) / (2.0 * PI);
        clamp_bin(u * self.lon_bins as f64, self.lon_bins)
    }

    fn cell(&self, lat_bin: usize, lon_bin: usize) -> usize {
        lat_bin * self.lon_bins + lon_bin
    }

    /// Candidate indices from the bins surrounding `(lat_bin, lon_bin)`.
    /// Polar clamping can revisit a bin; each bin is scanned once.
    fn candidates(&self, lat_bin: usize, lon_bin: usize, out: &mut Vec<usize>) {
        out.clear();
        let mut seen: Vec<usize> = Vec::with_capacity(9);
        for di in -1i64..=1 {
            let bl = (lat_bin as i64 + di).clamp(0, self.lat_bins as i64 - 1) as usize;
            for dj in -1i64..=1 {
                let bj = (lon_bin as i64 + dj).rem_euclid(self.lon_bins as i64) as usize;
                let cell = self.cell(bl, bj);
                if seen.contains(&cell) {
                    continue;
                }
                seen.push(cell);
                out.extend_from_slice(&self.cells[cell]);
            }
        }
    }
}

fn clamp_bin(x: f64, bins: usize) -> usize {
    (x.floor().max(0.0) as usize).min(bins - 1)
}

fn chord(a: Vec3, b: Vec3) -> f64 {
    1.0 - dot(a, b)
}

fn binned_nearest(
    bins: &Bins,
    positions: &[Vec3],
    lats: &[f64],
    lons: &[f64],
    k: usize,
) -> Adjacency {
    let mut adj = Adjacency::with_nodes(positions.len());
    let mut candidates = Vec::new();
    let mut ranked: Vec<(f64, usize)> = Vec::new();

    for i in 0..positions.len() {
        bins.candidates(bins.lat_bin(lats[i]), bins.lon_bin(lons[i]), &mut candidates);
        ranked.clear();
        ranked.extend(
            candidates
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (chord(positions[i], positions[j]), j)),
        );
        // Stable sort keeps bin-scan order among equal distances.
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        for &(_, j) in ranked.iter().take(k) {
            adj.link(i, j);
        }
    }
    adj
}

/// Link every component except the largest to the nearest node outside it,
/// repeating until one component remains. Each round at least halves the
/// component count.
fn bridge_components(
    bins: &Bins,
    positions: &[Vec3],
    lats: &[f64],
    lons: &[f64],
    adj: &mut Adjacency,
) {
    loop {
        let labels = component_labels(&*adj);
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            members.entry(label).or_default().push(i);
        }
        if members.len() <= 1 {
            return;
        }
        // Largest component stays put; ties go to the lowest label.
        let Some(main) = members
            .iter()
            .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))
            .map(|(&label, _)| label)
        else {
            return;
        };

        let mut candidates = Vec::new();
        for (&label, nodes) in &members {
            if label == main {
                continue;
            }
            let mut best: Option<(f64, usize, usize)> = None;
            for &i in nodes {
                bins.candidates(bins.lat_bin(lats[i]), bins.lon_bin(lons[i]), &mut candidates);
                for &j in &candidates {
                    if labels[j] != label {
                        keep_closer(&mut best, chord(positions[i], positions[j]), i, j);
                    }
                }
            }
            if best.is_none() {
                // Nothing foreign in the surrounding bins: scan everything.
                for &i in nodes {
                    for (j, &pj) in positions.iter().enumerate() {
                        if labels[j] != label {
                            keep_closer(&mut best, chord(positions[i], pj), i, j);
                        }
                    }
                }
            }
            if let Some((_, i, j)) = best {
                adj.link(i, j);
            }
        }
    }
}

fn keep_closer(best: &mut Option<(f64, usize, usize)>, d: f64, i: usize, j: usize) {
    if best.map_or(true, |(bd, _, _)| d < bd) {
        *best = Some((d, i, j));
    }
}
