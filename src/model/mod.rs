//! Regression strategies
//!
//! The forecast engine is written once against `Regressor`; the concrete
//! model (tree ensemble or linear) is chosen per request from `ModelConfig`.
//! Models are built fresh for every request and never persisted.

pub mod linear;
pub mod random_forest;

pub use linear::LinearRegressor;
pub use random_forest::RandomForestRegressor;

use crate::config::{ModelConfig, ModelKind};
use crate::error::ModelError;

/// One sample's features: `[diff, rolling_mean, rolling_std]`
pub type FeatureRow = [f64; 3];

/// Feature → target regression capability
pub trait Regressor: Send + Sync {
    /// Fit on scaled feature rows and scaled targets
    fn fit(&mut self, x: &[FeatureRow], y: &[f64]) -> Result<(), ModelError>;

    /// Predict one value per feature row
    fn predict(&self, x: &[FeatureRow]) -> Result<Vec<f64>, ModelError>;

    fn is_fitted(&self) -> bool;
}

/// Build an unfitted regressor for the configured strategy
pub fn build_regressor(config: &ModelConfig, seed: u64) -> Box<dyn Regressor> {
    match config.kind {
        ModelKind::RandomForest => Box::new(RandomForestRegressor::from_config(config, seed)),
        ModelKind::Linear => Box::new(LinearRegressor::new()),
    }
}

fn check_training_set(x: &[FeatureRow], y: &[f64]) -> Result<(), ModelError> {
    if x.len() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.len(),
            targets: y.len(),
        });
    }
    if x.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_regressor_kinds() {
        let mut config = ModelConfig::default();
        let forest = build_regressor(&config, 1);
        assert!(!forest.is_fitted());

        config.kind = ModelKind::Linear;
        let mut linear = build_regressor(&config, 1);
        linear.fit(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]], &[0.0, 1.0]).unwrap();
        assert!(linear.is_fitted());
    }

    #[test]
    fn test_training_set_checks() {
        assert!(matches!(
            check_training_set(&[[0.0; 3]], &[1.0, 2.0]),
            Err(ModelError::LengthMismatch { rows: 1, targets: 2 })
        ));
        assert!(matches!(check_training_set(&[], &[]), Err(ModelError::EmptyTrainingSet)));
    }
}
