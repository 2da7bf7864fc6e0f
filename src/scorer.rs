//! Sustainability Scorer - windowed reduction of mineral forecasts
//!
//! Splits every mineral's future predictions into `num_scores` chunks of
//! `chunk_size` points and scores each chunk by how far the predicted
//! concentrations drift from their historical norm:
//!
//!   z     = |chunk mean − historical mean| / historical std   (std 0 → 1)
//!   raw   = clamp(10 · (1 − z/3), 1, 10)
//!   score = Σ raw·weight / Σ weight                            (Σ weight 0 → 1)
//!
//! Scores and trends are rounded to 2 decimals. Minerals are visited in name
//! order so the weighted sum is stable.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ForecastConfig;
use crate::data::TimeSeries;
use crate::error::{PipelineError, Result};
use crate::utils::stats;

/// Mineral name → non-negative weight (normalised during scoring)
pub type MineralWeightMap = BTreeMap<String, f64>;

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;

/// Score of one chunk of the horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainabilityScore {
    /// 1-based period number
    pub period: usize,
    /// 1-based inclusive range of future points
    pub point_range: (usize, usize),
    /// Display label of the range, e.g. "1-4"
    pub points: String,
    pub score: f64,
    pub trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub average_score: f64,
    pub overall_trend: f64,
    pub total_periods: usize,
    pub min_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainabilityReport {
    pub graph_data: Vec<SustainabilityScore>,
    pub metadata: ReportMetadata,
}

/// Historical norm of one mineral
#[derive(Debug, Clone, Copy)]
struct HistoricalNorm {
    mean: f64,
    /// Never 0: zero or undefined deviations are stored as 1
    std: f64,
}

impl HistoricalNorm {
    fn from_values(values: &[f64]) -> Self {
        let std = stats::sample_std(values)
            .filter(|s| s.is_finite() && *s != 0.0)
            .unwrap_or(1.0);
        Self {
            mean: stats::mean(values).unwrap_or(0.0),
            std,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SustainabilityScorer {
    chunk_size: usize,
    num_scores: usize,
}

impl SustainabilityScorer {
    pub fn new(chunk_size: usize, num_scores: usize) -> Self {
        Self {
            chunk_size,
            num_scores,
        }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Self::new(config.chunk_size, config.num_scores())
    }

    /// Points each prediction sequence must provide
    pub fn required_points(&self) -> usize {
        self.num_scores * self.chunk_size
    }

    /// Score the horizon
    ///
    /// # Arguments
    /// * `predictions` - future predictions per mineral
    /// * `history` - observed series per mineral
    /// * `weights` - importance per mineral; minerals without a weight, a
    ///   prediction or a history are left out of the weighted average
    pub fn score(
        &self,
        predictions: &BTreeMap<String, Vec<f64>>,
        history: &BTreeMap<String, TimeSeries>,
        weights: &MineralWeightMap,
    ) -> Result<SustainabilityReport> {
        let required = self.required_points();
        for (mineral, values) in predictions {
            if values.len() < required {
                return Err(PipelineError::InsufficientPredictions {
                    mineral: mineral.clone(),
                    required,
                    actual: values.len(),
                });
            }
        }

        // Historical norms computed once, reused for every chunk
        let norms: FxHashMap<&str, HistoricalNorm> = history
            .iter()
            .map(|(name, series)| (name.as_str(), HistoricalNorm::from_values(&series.values)))
            .collect();

        let participants: Vec<(&[f64], HistoricalNorm, f64)> = weights
            .iter()
            .filter_map(|(name, weight)| {
                let values = predictions.get(name)?;
                let norm = norms.get(name.as_str())?;
                let weight = if weight.is_finite() && *weight > 0.0 { *weight } else { 0.0 };
                Some((values.as_slice(), *norm, weight))
            })
            .collect();

        debug!(
            minerals = participants.len(),
            periods = self.num_scores,
            "Scoring sustainability"
        );

        let mut graph_data = Vec::with_capacity(self.num_scores);
        let mut previous: Option<f64> = None;

        for period in 0..self.num_scores {
            let start = period * self.chunk_size;
            let end = start + self.chunk_size;

            let mut weighted_sum = 0.0;
            let mut total_weight = 0.0;
            for (values, norm, weight) in &participants {
                let chunk_mean = stats::mean(&values[start..end]).unwrap_or(norm.mean);
                weighted_sum += raw_score(chunk_mean, norm) * weight;
                total_weight += weight;
            }

            let score = if total_weight > 0.0 {
                round2(weighted_sum / total_weight)
            } else {
                MIN_SCORE
            };
            let trend = previous.map_or(0.0, |p| round2(score - p));
            previous = Some(score);

            graph_data.push(SustainabilityScore {
                period: period + 1,
                point_range: (start + 1, end),
                points: format!("{}-{}", start + 1, end),
                score,
                trend,
            });
        }

        let metadata = summarize(&graph_data);
        Ok(SustainabilityReport {
            graph_data,
            metadata,
        })
    }
}

fn raw_score(chunk_mean: f64, norm: &HistoricalNorm) -> f64 {
    let z = (chunk_mean - norm.mean).abs() / norm.std;
    let raw = 10.0 * (1.0 - z / 3.0);
    if raw.is_nan() {
        MIN_SCORE
    } else {
        raw.clamp(MIN_SCORE, MAX_SCORE)
    }
}

fn summarize(scores: &[SustainabilityScore]) -> ReportMetadata {
    let values: Vec<f64> = scores.iter().map(|s| s.score).collect();
    let (first, last) = match (values.first(), values.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => (0.0, 0.0),
    };

    ReportMetadata {
        average_score: round2(stats::mean(&values).unwrap_or(0.0)),
        overall_trend: round2(last - first),
        total_periods: scores.len(),
        min_score: stats::min(&values).unwrap_or(0.0),
        max_score: stats::max(&values).unwrap_or(0.0),
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn history_of(name: &str, values: Vec<f64>) -> (String, TimeSeries) {
        (name.to_string(), TimeSeries::new(name, values))
    }

    #[test]
    fn test_predictions_at_mean_score_ten() {
        let history: BTreeMap<_, _> = [history_of("Fe", vec![1.0, 2.0, 3.0, 4.0, 5.0])].into();
        let predictions: BTreeMap<_, _> = [("Fe".to_string(), vec![3.0; 100])].into();
        let weights: MineralWeightMap = [("Fe".to_string(), 1.0)].into();

        let report = SustainabilityScorer::new(4, 25)
            .score(&predictions, &history, &weights)
            .unwrap();

        assert_eq!(report.graph_data.len(), 25);
        assert!(report.graph_data.iter().all(|s| s.score == 10.0 && s.trend == 0.0));
        assert_eq!(report.graph_data[0].point_range, (1, 4));
        assert_eq!(report.graph_data[24].point_range, (97, 100));
        assert_eq!(report.graph_data[24].points, "97-100");
        assert_eq!(report.metadata.total_periods, 25);
        assert_relative_eq!(report.metadata.average_score, 10.0);
        assert_relative_eq!(report.metadata.overall_trend, 0.0);
    }

    #[test]
    fn test_zero_std_uses_unit_denominator() {
        let history: BTreeMap<_, _> = [history_of("Cu", vec![2.0; 10])].into();
        let predictions: BTreeMap<_, _> = [("Cu".to_string(), vec![3.5; 8])].into();
        let weights: MineralWeightMap = [("Cu".to_string(), 1.0)].into();

        let report = SustainabilityScorer::new(4, 2)
            .score(&predictions, &history, &weights)
            .unwrap();
        // z = 1.5 / 1 → 10 · (1 − 0.5) = 5
        assert_relative_eq!(report.graph_data[0].score, 5.0);
    }

    #[test]
    fn test_weighted_average_and_trend() {
        // Zn history mean 0, std 1 → chunk at 1.5 scores 5, chunk at 0 scores 10
        let history: BTreeMap<_, _> = [
            history_of("Mn", vec![-1.0, 1.0, -1.0, 1.0]),
            history_of("Zn", vec![-1.0, 1.0, -1.0, 1.0]),
        ]
        .into();
        let zn_std = stats::sample_std(&[-1.0, 1.0, -1.0, 1.0]).unwrap();
        let predictions: BTreeMap<_, _> = [
            ("Mn".to_string(), vec![0.0; 4]),
            ("Zn".to_string(), vec![0.0, 0.0, 1.5 * zn_std, 1.5 * zn_std]),
        ]
        .into();
        let weights: MineralWeightMap = [("Mn".to_string(), 3.0), ("Zn".to_string(), 1.0)].into();

        let report = SustainabilityScorer::new(2, 2)
            .score(&predictions, &history, &weights)
            .unwrap();

        assert_relative_eq!(report.graph_data[0].score, 10.0);
        // (10·3 + 5·1) / 4 = 8.75
        assert_relative_eq!(report.graph_data[1].score, 8.75);
        assert_relative_eq!(report.graph_data[1].trend, -1.25);
        assert_relative_eq!(report.metadata.overall_trend, -1.25);
        assert_relative_eq!(report.metadata.min_score, 8.75);
        assert_relative_eq!(report.metadata.max_score, 10.0);
        assert_relative_eq!(report.metadata.average_score, 9.38);
    }

    #[test]
    fn test_scores_clamped_and_zero_weight_defaults() {
        let history: BTreeMap<_, _> = [history_of("Ni", vec![0.0, 1.0, 0.0, 1.0])].into();
        let predictions: BTreeMap<_, _> = [("Ni".to_string(), vec![1e6; 4])].into();

        let weights: MineralWeightMap = [("Ni".to_string(), 1.0)].into();
        let report = SustainabilityScorer::new(4, 1).score(&predictions, &history, &weights).unwrap();
        assert_relative_eq!(report.graph_data[0].score, 1.0);

        let weights: MineralWeightMap = [("Ni".to_string(), 0.0)].into();
        let report = SustainabilityScorer::new(4, 1).score(&predictions, &history, &weights).unwrap();
        assert_relative_eq!(report.graph_data[0].score, 1.0);
        assert_relative_eq!(report.metadata.min_score, 1.0);
        assert_relative_eq!(report.metadata.max_score, 1.0);
    }

    #[test]
    fn test_short_predictions_rejected() {
        let history: BTreeMap<_, _> = [history_of("Fe", vec![1.0, 2.0])].into();
        let predictions: BTreeMap<_, _> = [("Fe".to_string(), vec![1.0; 99])].into();
        let weights: MineralWeightMap = [("Fe".to_string(), 1.0)].into();

        let err = SustainabilityScorer::new(4, 25)
            .score(&predictions, &history, &weights)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientPredictions { required: 100, actual: 99, .. }
        ));
    }

    #[test]
    fn test_serialized_field_names() {
        let history: BTreeMap<_, _> = [history_of("Fe", vec![1.0, 2.0])].into();
        let predictions: BTreeMap<_, _> = [("Fe".to_string(), vec![1.5; 4])].into();
        let weights: MineralWeightMap = [("Fe".to_string(), 1.0)].into();
        let report = SustainabilityScorer::new(4, 1).score(&predictions, &history, &weights).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["graphData"][0]["pointRange"], serde_json::json!([1, 4]));
        assert!(json["metadata"]["averageScore"].is_number());
        assert!(json["metadata"]["totalPeriods"].is_number());
    }
}
