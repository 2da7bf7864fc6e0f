//! Peak characterisation
//!
//! Summarises the local maxima of a series (average height and average gap)
//! so the synthetic generator can reproduce its shape past the horizon.
//!
//! Peak rules:
//!   1. A peak is strictly above its left neighbour and strictly above the
//!      next differing sample to its right; flat tops report their middle.
//!   2. Peaks below the series mean are discarded.
//!   3. Spacing is enforced by priority: tallest peaks are kept first and any
//!      peak closer than `min_spacing` to a kept one is dropped.

use serde::{Deserialize, Serialize};

use crate::utils::stats;

/// Summary statistics of a series' local maxima
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakProfile {
    pub avg_height: f64,
    /// Always finite and ≥ 1
    pub avg_spacing: f64,
}

#[derive(Debug, Clone)]
pub struct PeakProfiler {
    pub min_spacing: usize,
    pub default_spacing: f64,
}

impl Default for PeakProfiler {
    fn default() -> Self {
        Self {
            min_spacing: 20,
            default_spacing: 20.0,
        }
    }
}

impl PeakProfiler {
    pub fn new(min_spacing: usize, default_spacing: f64) -> Self {
        Self {
            min_spacing,
            default_spacing: sanitize_spacing(default_spacing, 20.0),
        }
    }

    /// Characterise the peaks of `values`
    ///
    /// Non-finite samples are replaced by the series mean before searching.
    pub fn profile(&self, values: &[f64]) -> PeakProfile {
        let series_mean = stats::mean(values).unwrap_or(0.0);
        let clean: Vec<f64> = values
            .iter()
            .map(|v| if v.is_finite() { *v } else { series_mean })
            .collect();

        let peaks = self.find_peaks(&clean, series_mean);

        if peaks.is_empty() {
            return PeakProfile {
                avg_height: series_mean,
                avg_spacing: self.default_spacing,
            };
        }

        let heights: Vec<f64> = peaks.iter().map(|&i| clean[i]).collect();
        let avg_height = stats::mean(&heights).unwrap_or(series_mean);

        let avg_spacing = if peaks.len() > 1 {
            let gaps: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
            stats::mean(&gaps).unwrap_or(self.default_spacing)
        } else {
            self.default_spacing
        };

        PeakProfile {
            avg_height,
            avg_spacing: sanitize_spacing(avg_spacing, self.default_spacing),
        }
    }

    /// Indices of qualifying peaks in ascending order
    pub fn find_peaks(&self, values: &[f64], min_height: f64) -> Vec<usize> {
        let candidates: Vec<usize> = local_maxima(values)
            .into_iter()
            .filter(|&i| values[i] >= min_height)
            .collect();

        enforce_spacing(values, candidates, self.min_spacing)
    }
}

fn sanitize_spacing(spacing: f64, fallback: f64) -> f64 {
    if spacing.is_finite() {
        spacing.max(1.0)
    } else {
        fallback.max(1.0)
    }
}

/// Local maxima with plateau handling, endpoints excluded
fn local_maxima(values: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    let n = values.len();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            // Walk across a flat top
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                let right_edge = ahead - 1;
                peaks.push((i + right_edge) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `min_spacing` to a taller kept peak
fn enforce_spacing(values: &[f64], peaks: Vec<usize>, min_spacing: usize) -> Vec<usize> {
    if min_spacing <= 1 || peaks.len() < 2 {
        return peaks;
    }

    // Visit from tallest to shortest; ties resolved toward later positions
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        values[peaks[b]]
            .partial_cmp(&values[peaks[a]])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.cmp(&a))
    });

    let mut keep = vec![true; peaks.len()];
    for &idx in &order {
        if !keep[idx] {
            continue;
        }
        let position = peaks[idx];

        let mut k = idx;
        while k > 0 && position - peaks[k - 1] < min_spacing {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = idx + 1;
        while k < peaks.len() && peaks[k] - position < min_spacing {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}
