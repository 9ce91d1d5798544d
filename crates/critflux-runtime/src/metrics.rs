//! Spatial diagnostics computed from a field snapshot.
//!
//! All metrics are read-only over the field and the graph. Degenerate
//! inputs (a uniform field, an edgeless graph) produce documented zero
//! fallbacks rather than NaN.

use critflux_core::error::{CritfluxError, Result};
use critflux_core::graph::AdjacencyGraph;
use critflux_core::state::FieldState;
use critflux_core::topology::GridDims;
use serde::Serialize;
use std::f64::consts::E;
use std::fmt;

/// Normalized correlation length above which a field counts as patterned.
pub const PATTERN_THRESHOLD: f64 = 0.2;

/// Cluster threshold used by the structure overlay.
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.5;

/// Coarse classification of a correlation length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Pattern,
    None,
}

impl Regime {
    pub fn classify(correlation_length: f64) -> Self {
        if correlation_length > PATTERN_THRESHOLD {
            Regime::Pattern
        } else {
            Regime::None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Regime::Pattern => "pattern",
            Regime::None => "none",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Connected regions at or above a threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClusterStats {
    pub count: usize,
    pub mean_size: f64,
    pub max_size: usize,
}

/// Moran's I and cluster statistics over one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StructureMetrics {
    pub moran_i: f64,
    pub clusters: ClusterStats,
}

/// Field means and total energy at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldSummary {
    pub time: f64,
    pub mean_energy: f64,
    pub mean_info: f64,
    /// Mean structure, clamped to `[0, 1]`.
    pub mean_structure: f64,
    pub total_energy: f64,
}

impl FieldSummary {
    pub fn of(state: &FieldState) -> Self {
        let n = state.len().max(1) as f64;
        let total_energy = state.total_energy();
        Self {
            time: state.time,
            mean_energy: total_energy / n,
            mean_info: state.info.iter().sum::<f64>() / n,
            mean_structure: (state.structure.iter().sum::<f64>() / n).clamp(0.0, 1.0),
            total_energy,
        }
    }
}

/// Characteristic pattern length of `values` on a lattice, normalized by
/// the shorter grid side.
///
/// The mean-centered autocorrelation is averaged over all cell pairs at
/// each rounded radial lag `r` in `1..min(H, W)/4`. Pairs that would cross
/// an unwrapped edge are skipped. The result is the first `r >= 2` whose
/// correlation drops below `c(1)/e`, or the scan radius if none does.
///
/// Returns `0.0` for a uniform field or a grid too small to give two lags.
pub fn correlation_length(values: &[f64], grid: GridDims) -> Result<f64> {
    if values.len() != grid.len() {
        return Err(CritfluxError::length_mismatch("values", grid.len(), values.len()));
    }
    let side = grid.height.min(grid.width);
    let max_r = side / 4;
    if max_r < 3 {
        return Ok(0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    if variance <= 0.0 || !variance.is_finite() {
        return Ok(0.0);
    }

    let reach = max_r as isize;
    let mut offsets = Vec::new();
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let r = ((dx * dx + dy * dy) as f64).sqrt().round() as usize;
            if r == 0 || r >= max_r {
                continue;
            }
            offsets.push((dx, dy, r));
        }
    }

    let mut corr = vec![0.0; max_r];
    let mut counts = vec![0u64; max_r];
    let (w, h) = (grid.width as isize, grid.height as isize);
    for y in 0..h {
        for x in 0..w {
            let di = values[grid.index(x as usize, y as usize)] - mean;
            for &(dx, dy, r) in &offsets {
                let Some(nx) = shift(x, dx, w, grid.wrap.wraps_x()) else {
                    continue;
                };
                let Some(ny) = shift(y, dy, h, grid.wrap.wraps_y()) else {
                    continue;
                };
                corr[r] += di * (values[grid.index(nx, ny)] - mean);
                counts[r] += 1;
            }
        }
    }
    for (c, &count) in corr.iter_mut().zip(&counts) {
        if count > 0 {
            *c /= count as f64;
        }
    }

    let cutoff = corr[1] / E;
    let lag = (2..max_r).find(|&r| corr[r] < cutoff).unwrap_or(max_r);
    Ok(lag as f64 / side as f64)
}

fn shift(at: isize, by: isize, extent: isize, wraps: bool) -> Option<usize> {
    let moved = at + by;
    if wraps {
        Some(moved.rem_euclid(extent) as usize)
    } else if (0..extent).contains(&moved) {
        Some(moved as usize)
    } else {
        None
    }
}

/// Moran's I of `values` over the graph's adjacency.
///
/// `(N / W) · Σ_i Σ_{j∈N(i)} d_i d_j / Σ_i d_i²` with `W` the number of
/// directed edge endpoints. `0.0` when the field is uniform or the graph
/// has no edges.
pub fn moran_i<G: AdjacencyGraph + ?Sized>(values: &[f64], graph: &G) -> Result<f64> {
    check_values(values, graph)?;
    let n = values.len();
    if n == 0 {
        return Ok(0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let denom: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();

    let mut numer = 0.0;
    let mut weight = 0usize;
    for (i, &v) in values.iter().enumerate() {
        let di = v - mean;
        let nb = graph.neighbors(i);
        weight += nb.len();
        numer += nb.iter().map(|&j| di * (values[j] - mean)).sum::<f64>();
    }

    if denom > 0.0 && weight > 0 {
        Ok((n as f64 / weight as f64) * (numer / denom))
    } else {
        Ok(0.0)
    }
}

/// Flood-fill the nodes whose value is at least `threshold` into
/// connected clusters.
pub fn cluster_stats<G: AdjacencyGraph + ?Sized>(
    values: &[f64],
    graph: &G,
    threshold: f64,
) -> Result<ClusterStats> {
    check_values(values, graph)?;
    let n = values.len();
    let mut visited = vec![false; n];
    let mut stack = Vec::new();
    let mut stats = ClusterStats::default();
    let mut total = 0usize;

    for start in 0..n {
        if visited[start] || values[start] < threshold {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut size = 0;
        while let Some(cur) = stack.pop() {
            size += 1;
            for &j in graph.neighbors(cur) {
                if visited[j] || values[j] < threshold {
                    continue;
                }
                visited[j] = true;
                stack.push(j);
            }
        }
        stats.count += 1;
        stats.max_size = stats.max_size.max(size);
        total += size;
    }

    if stats.count > 0 {
        stats.mean_size = total as f64 / stats.count as f64;
    }
    Ok(stats)
}

/// Moran's I and clusters together, as the structure overlay reports them.
pub fn structure_metrics<G: AdjacencyGraph + ?Sized>(
    values: &[f64],
    graph: &G,
    threshold: f64,
) -> Result<StructureMetrics> {
    Ok(StructureMetrics {
        moran_i: moran_i(values, graph)?,
        clusters: cluster_stats(values, graph, threshold)?,
    })
}

fn check_values<G: AdjacencyGraph + ?Sized>(values: &[f64], graph: &G) -> Result<()> {
    if values.len() != graph.node_count() {
        return Err(CritfluxError::length_mismatch(
            "values",
            graph.node_count(),
            values.len(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use critflux_core::topology::{Topology, Wrap};

    fn grid(height: usize, width: usize, wrap: Wrap) -> GridDims {
        GridDims {
            height,
            width,
            wrap,
        }
    }

    #[test]
    fn regime_threshold_is_exclusive() {
        assert_eq!(Regime::classify(0.2), Regime::None);
        assert_eq!(Regime::classify(0.21), Regime::Pattern);
        assert_eq!(Regime::Pattern.to_string(), "pattern");
    }

    #[test]
    fn uniform_field_has_zero_length() {
        let g = grid(32, 32, Wrap::Both);
        let xi = correlation_length(&vec![0.4; g.len()], g).unwrap();
        assert_eq!(xi, 0.0);
    }

    #[test]
    fn tiny_grid_has_zero_length() {
        let g = grid(8, 8, Wrap::Both);
        let values: Vec<f64> = (0..g.len()).map(|i| (i % 3) as f64).collect();
        assert_eq!(correlation_length(&values, g).unwrap(), 0.0);
    }

    #[test]
    fn wide_stripes_are_longer_than_noise() {
        let g = grid(40, 40, Wrap::Both);
        let stripes: Vec<f64> = (0..g.len())
            .map(|i| if (i % 40) / 10 % 2 == 0 { 1.0 } else { 0.0 })
            .collect();
        let checker: Vec<f64> = (0..g.len())
            .map(|i| ((i % 40 + i / 40) % 2) as f64)
            .collect();
        let xi_stripes = correlation_length(&stripes, g).unwrap();
        let xi_checker = correlation_length(&checker, g).unwrap();
        assert!(xi_stripes > 0.0);
        assert!(xi_stripes > xi_checker, "{xi_stripes} vs {xi_checker}");
    }

    #[test]
    fn unwrapped_edges_are_not_crossed() {
        let g = grid(24, 24, Wrap::None);
        let values: Vec<f64> = (0..g.len()).map(|i| (i % 24) as f64).collect();
        let xi = correlation_length(&values, g).unwrap();
        assert!(xi.is_finite() && xi > 0.0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let g = grid(16, 16, Wrap::Both);
        assert!(correlation_length(&[0.0; 10], g).is_err());
    }

    #[test]
    fn moran_of_uniform_field_is_zero() {
        let mesh = Topology::Icosphere { subdivisions: 1 }.build().unwrap();
        assert_eq!(moran_i(&vec![1.0; mesh.len()], &mesh).unwrap(), 0.0);
    }

    #[test]
    fn clusters_on_a_path() {
        let path = vec![vec![1], vec![0, 2], vec![1, 3], vec![2, 4], vec![3]];
        let stats = cluster_stats(&[1.0, 1.0, 0.0, 1.0, 0.2], &path, 0.5).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max_size, 2);
        assert!((stats.mean_size - 1.5).abs() < 1e-12);
    }

    #[test]
    fn summary_means() {
        let state =
            FieldState::from_fields(vec![1.0, 3.0], vec![0.5, 0.5], vec![0.0, 1.0]).unwrap();
        let summary = FieldSummary::of(&state);
        assert_eq!(summary.mean_energy, 2.0);
        assert_eq!(summary.total_energy, 4.0);
        assert_eq!(summary.mean_structure, 0.5);
    }
}
