//! Mining Forecast Rust Implementation
//!
//! Mineral concentration forecasting and mining sustainability scoring.
//!
//! - `utils/`: Series statistics and min-max normalization
//! - `data`: Soil measurement tables, time series, dataset providers (Polars CSV)
//! - `forecast/`: Peak profiling, synthetic extrapolation, features, forecast engine
//! - `model/`: Regression strategies (random forest, linear)
//! - `scorer`: Windowed multi-mineral sustainability scoring
//! - `providers`: Weight sources and advisory text
//! - `pipeline`: Per-request orchestration, emissions, cancellation
//! - `api_server`: Session protocol over HTTP (feature `api`)

pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod model;
pub mod pipeline;
pub mod providers;
pub mod scorer;
pub mod utils;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use config::{ForecastConfig, ModelConfig, ModelKind};
pub use data::{
    CsvDatasetProvider, DatasetProvider, FallbackDatasetProvider, InMemoryDatasetProvider,
    TabularData, TimeSeries,
};
pub use error::{AdvisoryError, DatasetError, ModelError, PipelineError, WeightError};
pub use forecast::{
    percent_accuracy, FeatureBuilder, FeatureFrame, ForecastEngine, ForecastResult, PeakProfile,
    PeakProfiler, PreparedForecast, SyntheticSignalGenerator,
};
pub use model::{build_regressor, FeatureRow, Regressor};
pub use pipeline::{CancelFlag, ChartEntry, Emission, PipelineOrchestrator, PipelineOutcome, PipelineStage};
pub use providers::{
    AdvisoryTextService, AdvisoryWeightProvider, DisabledAdvisory, JsonFileWeights,
    ReportSummaryAdvisory, StaticWeights, UniformWeights, WeightProvider,
};
pub use scorer::{MineralWeightMap, SustainabilityReport, SustainabilityScore, SustainabilityScorer};
