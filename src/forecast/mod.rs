//! Forecasting core
//!
//! Peak profiling, synthetic extrapolation, feature construction and the
//! model-driven forecast engine.

pub mod engine;
pub mod features;
pub mod peaks;
pub mod synthetic;

pub use engine::{percent_accuracy, ForecastEngine, ForecastResult, PreparedForecast, TrainedForecaster};
pub use features::{FeatureBuilder, FeatureFrame};
pub use peaks::{PeakProfile, PeakProfiler};
pub use synthetic::SyntheticSignalGenerator;
