//! Feature construction
//!
//! Three aligned features per sample: first difference, trailing rolling mean
//! and trailing rolling std. Windows expand at the start (minimum one sample);
//! rolling std entries with fewer than two samples take the series' global
//! std, or 0 when that is undefined too.

use crate::model::FeatureRow;
use crate::utils::stats;

/// Differencing and rolling-window features of one series
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub diff: Vec<f64>,
    pub rolling_mean: Vec<f64>,
    pub rolling_std: Vec<f64>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.diff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }

    /// Row-major `[diff, rolling_mean, rolling_std]` rows for the regressor
    pub fn rows(&self) -> Vec<FeatureRow> {
        self.diff
            .iter()
            .zip(&self.rolling_mean)
            .zip(&self.rolling_std)
            .map(|((d, m), s)| [*d, *m, *s])
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    pub window: usize,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self { window: 5 }
    }
}

impl FeatureBuilder {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(1) }
    }

    /// Features of an observed series; `diff[0]` is 0
    pub fn historical(&self, values: &[f64]) -> FeatureFrame {
        self.build(values, None)
    }

    /// Features of a synthetic continuation
    ///
    /// `diff[0]` is measured from the last observed value so the feature
    /// sequence stays continuous across the history/future boundary.
    pub fn future(&self, synthetic: &[f64], last_historical: f64) -> FeatureFrame {
        self.build(synthetic, Some(last_historical))
    }

    fn build(&self, values: &[f64], diff_seed: Option<f64>) -> FeatureFrame {
        let fallback_std = stats::sample_std(values).unwrap_or(0.0);

        let rolling_std = stats::rolling_std(values, self.window)
            .into_iter()
            .map(|s| s.filter(|v| v.is_finite()).unwrap_or(fallback_std))
            .collect();

        FeatureFrame {
            diff: stats::diff_seeded(values, diff_seed),
            rolling_mean: stats::rolling_mean(values, self.window),
            rolling_std,
        }
    }
}
