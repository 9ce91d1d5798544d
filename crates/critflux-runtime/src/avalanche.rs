//! Avalanche detection and power-law fitting.
//!
//! The detector consumes the per-step collapse count. An avalanche opens
//! on the first step with collapses and closes on the first quiet step
//! that comes more than `quiet_period` time units after the last
//! collapse. Its size is the summed collapse count over its lifetime.

use serde::Serialize;
use std::collections::BTreeMap;

/// Default quiet period in time units.
pub const DEFAULT_QUIET_PERIOD: f64 = 5.0;

/// Minimum number of avalanches before the max/median heuristic is shown.
pub const MIN_AVALANCHES_FOR_RATIO: usize = 5;

/// One closed avalanche.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Avalanche {
    pub start: f64,
    /// Summed collapse count.
    pub size: u64,
    pub duration: f64,
    /// Summed activity (released energy) over the avalanche.
    pub activity: f64,
}

#[derive(Debug, Clone, Copy)]
struct OpenAvalanche {
    start: f64,
    size: u64,
    activity: f64,
}

/// Streaming avalanche detector.
#[derive(Debug, Clone)]
pub struct AvalancheDetector {
    quiet_period: f64,
    avalanches: Vec<Avalanche>,
    current: Option<OpenAvalanche>,
    last_collapse: f64,
    last_time: f64,
}

impl Default for AvalancheDetector {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl AvalancheDetector {
    pub fn new(quiet_period: f64) -> Self {
        Self {
            quiet_period,
            avalanches: Vec::new(),
            current: None,
            last_collapse: f64::NEG_INFINITY,
            last_time: 0.0,
        }
    }

    pub fn quiet_period(&self) -> f64 {
        self.quiet_period
    }

    /// Feed one step.
    pub fn record(&mut self, t: f64, collapse_count: usize, activity: f64) {
        let collapsed = collapse_count > 0;
        if collapsed && self.current.is_none() {
            self.current = Some(OpenAvalanche {
                start: t,
                size: 0,
                activity: 0.0,
            });
        }

        if let Some(open) = self.current.as_mut() {
            open.size += collapse_count as u64;
            open.activity += activity;
            if !collapsed && t - self.last_collapse > self.quiet_period {
                self.close(t);
            }
        }

        if collapsed {
            self.last_collapse = t;
        }
        self.last_time = t;
    }

    /// Close an avalanche still open at the end of a run.
    pub fn finish(&mut self) {
        self.close(self.last_time);
    }

    fn close(&mut self, t: f64) {
        if let Some(open) = self.current.take() {
            self.avalanches.push(Avalanche {
                start: open.start,
                size: open.size,
                duration: t - open.start,
                activity: open.activity,
            });
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn avalanches(&self) -> &[Avalanche] {
        &self.avalanches
    }

    /// Forget every avalanche and any open one.
    pub fn clear(&mut self) {
        *self = Self::new(self.quiet_period);
    }

    pub fn analyze(&self) -> AvalancheAnalysis {
        AvalancheAnalysis::from_sizes(self.avalanches.iter().map(|a| a.size))
    }
}

/// Size distribution of a set of avalanches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvalancheAnalysis {
    /// Power-law exponent, `None` with fewer than two occupied bins.
    pub tau: Option<f64>,
    pub total_avalanches: usize,
    pub avg_size: f64,
    /// Count per `floor(log2(size))` bin.
    pub size_bins: BTreeMap<u32, usize>,
    /// `(log10 bin size, log10 count)` per bin, ascending.
    pub log_points: Vec<(f64, f64)>,
    pub max_size: u64,
    pub median_size: u64,
    /// `max / median`, `0.0` when the median is zero.
    pub max_median_ratio: f64,
}

impl AvalancheAnalysis {
    pub fn from_sizes<I: IntoIterator<Item = u64>>(sizes: I) -> Self {
        let mut sizes: Vec<u64> = sizes.into_iter().collect();
        sizes.sort_unstable();

        let mut size_bins = BTreeMap::new();
        for &size in sizes.iter().filter(|&&s| s > 0) {
            *size_bins.entry(size.ilog2()).or_insert(0) += 1;
        }

        let (log_x, log_y): (Vec<f64>, Vec<f64>) = size_bins
            .iter()
            .map(|(&bin, &count)| (bin_size(bin).ln(), (count as f64).ln()))
            .unzip();
        let tau = regression_slope(&log_x, &log_y).map(|slope| -slope);

        let log_points = size_bins
            .iter()
            .map(|(&bin, &count)| (bin_size(bin).log10(), (count as f64).log10()))
            .collect();

        let total = sizes.len();
        let avg_size = if total > 0 {
            sizes.iter().sum::<u64>() as f64 / total as f64
        } else {
            0.0
        };
        let max_size = sizes.last().copied().unwrap_or(0);
        let median_size = sizes.get(total / 2).copied().unwrap_or(0);
        let max_median_ratio = if median_size > 0 {
            max_size as f64 / median_size as f64
        } else {
            0.0
        };

        Self {
            tau,
            total_avalanches: total,
            avg_size,
            size_bins,
            log_points,
            max_size,
            median_size,
            max_median_ratio,
        }
    }

    /// Whether there are enough avalanches for the max/median heuristic.
    pub fn has_enough_data(&self) -> bool {
        self.total_avalanches >= MIN_AVALANCHES_FOR_RATIO
    }
}

fn bin_size(bin: u32) -> f64 {
    2f64.powi(bin as i32)
}

/// Ordinary least-squares slope of `ys` against `xs`.
fn regression_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return None;
    }
    let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    let denom = n * sxx - sx * sx;
    if denom == 0.0 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    slope.is_finite().then_some(slope)
}

/// Scatter `points` onto a `width × height` character grid, y up.
pub fn ascii_plot(points: &[(f64, f64)], width: usize, height: usize) -> String {
    if points.is_empty() {
        return String::new();
    }
    let w = width.max(2);
    let h = height.max(2);
    let (mut xmin, mut xmax) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        xmin = xmin.min(x);
        xmax = xmax.max(x);
        ymin = ymin.min(y);
        ymax = ymax.max(y);
    }

    let mut grid = vec![vec![' '; w]; h];
    for &(x, y) in points {
        let col = scale(x, xmin, xmax, w);
        let row = h - 1 - scale(y, ymin, ymax, h);
        grid[row][col] = '*';
    }

    let mut out = String::from("logS (x) vs logP (y)\n");
    for row in grid {
        out.extend(row);
        out.push('\n');
    }
    out
}

fn scale(v: f64, lo: f64, hi: f64, cells: usize) -> usize {
    if hi == lo {
        return 0;
    }
    let pos = ((v - lo) / (hi - lo) * (cells - 1) as f64).round();
    (pos.max(0.0) as usize).min(cells - 1)
}
