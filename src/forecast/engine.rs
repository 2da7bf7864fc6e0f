//! Forecast engine
//!
//! Scales features and target to [0, 1], trains a regressor on the history,
//! then predicts both in-sample (for the accuracy metric) and over features
//! built from a synthetic continuation of the series. Predictions are mapped
//! back to concentration units with the target scaler.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::features::{FeatureBuilder, FeatureFrame};
use super::peaks::PeakProfile;
use super::synthetic::SyntheticSignalGenerator;
use crate::error::ModelError;
use crate::model::Regressor;
use crate::utils::{stats, MinMaxScaler};

/// In-sample fit plus the extrapolated horizon
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    /// Same length as the history
    pub historical_fit: Vec<f64>,
    /// Exactly `horizon` values
    pub future: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ForecastEngine {
    horizon: usize,
    features: FeatureBuilder,
    generator: SyntheticSignalGenerator,
}

/// Feature frames for the history and its synthetic continuation
#[derive(Debug, Clone)]
pub struct PreparedForecast {
    pub historical: FeatureFrame,
    /// Exactly `horizon` rows
    pub future: FeatureFrame,
}

impl ForecastEngine {
    pub fn new(horizon: usize, features: FeatureBuilder, generator: SyntheticSignalGenerator) -> Self {
        Self {
            horizon,
            features,
            generator,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn generator(&self) -> &SyntheticSignalGenerator {
        &self.generator
    }

    /// Build historical features and future features from a synthetic
    /// signal shaped by `profile`
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        history: &[f64],
        profile: &PeakProfile,
        rng: &mut R,
    ) -> Result<PreparedForecast, ModelError> {
        let last = *history.last().ok_or(ModelError::EmptyTrainingSet)?;
        let synthetic = self.generator.generate_from_profile(self.horizon, profile, rng);

        Ok(PreparedForecast {
            historical: self.features.historical(history),
            future: self.features.future(&synthetic, last),
        })
    }

    /// Fit `model` on scaled historical features and target
    ///
    /// `model` must be freshly built; it is fitted in place and dropped by the
    /// caller once the request is done.
    pub fn train<'m>(
        &self,
        target: &[f64],
        prepared: &PreparedForecast,
        model: &'m mut dyn Regressor,
    ) -> Result<TrainedForecaster<'m>, ModelError> {
        let hist_rows = prepared.historical.rows();
        let feature_scaler = MinMaxScaler::fit(&hist_rows);
        let target_scaler = MinMaxScaler::fit_column(target);

        let x_train = feature_scaler.transform(&hist_rows);
        let y_train = target_scaler.transform_column(target);
        model.fit(&x_train, &y_train)?;
        debug!(samples = x_train.len(), "Regressor fitted");

        Ok(TrainedForecaster {
            feature_scaler,
            target_scaler,
            model,
        })
    }
}

/// A fitted regressor together with the scalers it was trained under
pub struct TrainedForecaster<'m> {
    feature_scaler: MinMaxScaler,
    target_scaler: MinMaxScaler,
    model: &'m mut dyn Regressor,
}

impl TrainedForecaster<'_> {
    /// In-sample fit and the extrapolated horizon
    pub fn forecast(&self, prepared: &PreparedForecast) -> Result<ForecastResult, ModelError> {
        Ok(ForecastResult {
            historical_fit: self.predict(&prepared.historical)?,
            future: self.predict(&prepared.future)?,
        })
    }

    /// Predict in concentration units; features are scaled with the
    /// historical parameters, so future rows may fall outside [0, 1]
    pub fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
        let scaled = self.feature_scaler.transform(&frame.rows());
        let predicted = self.model.predict(&scaled)?;
        Ok(self.target_scaler.inverse_transform_column(&predicted))
    }
}

/// `100 · (1 − MAE / max(actual))`, with a max of 0 replaced by 1
pub fn percent_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    let mae = stats::mean(&errors).unwrap_or(0.0);

    let peak = stats::max(actual).unwrap_or(0.0);
    let denominator = if peak == 0.0 { 1.0 } else { peak };

    100.0 * (1.0 - mae / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearRegressor, RandomForestRegressor};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine(horizon: usize) -> ForecastEngine {
        ForecastEngine::new(horizon, FeatureBuilder::default(), SyntheticSignalGenerator::default())
    }

    fn run_forecast(
        engine: &ForecastEngine,
        history: &[f64],
        profile: &PeakProfile,
        model: &mut dyn Regressor,
        seed: u64,
    ) -> Result<ForecastResult, ModelError> {
        let prepared = engine.prepare(history, profile, &mut StdRng::seed_from_u64(seed))?;
        engine.train(history, &prepared, model)?.forecast(&prepared)
    }

    #[test]
    fn test_percent_accuracy() {
        assert_relative_eq!(percent_accuracy(&[10.0, 20.0, 30.0], &[10.0, 20.0, 30.0]), 100.0);
        assert_relative_eq!(percent_accuracy(&[10.0, 20.0, 40.0], &[12.0, 18.0, 40.0]), 100.0 * (1.0 - (4.0 / 3.0) / 40.0));

        let zero = percent_accuracy(&[0.0, 0.0, 0.0], &[1.0, 0.0, 2.0]);
        assert!(zero.is_finite());
        assert_relative_eq!(zero, 0.0);
    }

    #[test]
    fn test_forecast_lengths() {
        let history: Vec<f64> = (0..80).map(|i| 5.0 + (i as f64 * 0.4).sin()).collect();
        let profile = PeakProfile { avg_height: 6.0, avg_spacing: 16.0 };
        let mut model = RandomForestRegressor::new(10, 42);

        let result = run_forecast(&engine(100), &history, &profile, &mut model, 1).unwrap();
        assert_eq!(result.historical_fit.len(), history.len());
        assert_eq!(result.future.len(), 100);
        assert!(result.future.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forest_outputs_stay_in_target_range() {
        let history: Vec<f64> = (0..60).map(|i| 10.0 + (i % 7) as f64).collect();
        let profile = PeakProfile { avg_height: 16.0, avg_spacing: 7.0 };
        let mut model = RandomForestRegressor::new(10, 3);
        let result = run_forecast(&engine(40), &history, &profile, &mut model, 9).unwrap();
        // Leaf means of scaled targets invert back inside the observed range
        for v in result.historical_fit.iter().chain(&result.future) {
            assert!(*v >= 10.0 - 1e-9 && *v <= 16.0 + 1e-9);
        }
    }

    #[test]
    fn test_linear_fit_of_linear_target() {
        // Target equals its own rolling mean shifted, so a linear model fits well
        let history: Vec<f64> = (0..50).map(|i| 2.0 * i as f64).collect();
        let prepared = PreparedForecast {
            historical: FeatureBuilder::default().historical(&history),
            future: FeatureBuilder::default().future(&[100.0, 102.0], 98.0),
        };
        let mut model = LinearRegressor::new();
        let result = engine(2)
            .train(&history, &prepared, &mut model)
            .and_then(|trained| trained.forecast(&prepared))
            .unwrap();
        assert!(percent_accuracy(&history, &result.historical_fit) > 95.0);
    }

    #[test]
    fn test_empty_history_is_error() {
        let profile = PeakProfile { avg_height: 1.0, avg_spacing: 20.0 };
        let prepared = engine(10).prepare(&[], &profile, &mut StdRng::seed_from_u64(0));
        assert!(matches!(prepared, Err(ModelError::EmptyTrainingSet)));
    }
}
