//! Pipeline Orchestrator - one forecast-and-score request end to end
//!
//! Stages (each request walks them in order, `Errored` reachable from any):
//!
//!   Idle → ColumnValidated → FeaturesBuilt → ModelTrained → Forecasted → Scored → Completed
//!
//! The requested column goes through the trained-model path. Every other
//! mineral takes the cheap path (peak profile → synthetic signal) so the
//! scorer has a prediction per mineral without fitting a model per column.
//!
//! Failures are values: fatal ones end the request with a single error
//! emission, while weight and advisory failures are logged and absorbed.
//! Nothing outlives the request; collaborators are injected at construction.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ForecastConfig;
use crate::data::{DatasetProvider, TabularData, TimeSeries};
use crate::error::{PipelineError, Result};
use crate::forecast::{
    percent_accuracy, FeatureBuilder, ForecastEngine, ForecastResult, PeakProfiler,
    SyntheticSignalGenerator,
};
use crate::model::build_regressor;
use crate::providers::{advisory_prompt, uniform_weights, AdvisoryTextService, WeightProvider};
use crate::scorer::{SustainabilityReport, SustainabilityScorer};

// ============================================================================
// Request state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    Idle,
    ColumnValidated,
    FeaturesBuilt,
    ModelTrained,
    Forecasted,
    Scored,
    Completed,
    Errored,
}

/// Cooperative cancellation shared between a request and its owner
///
/// A child flag also reports cancellation once its parent is cancelled, so
/// a session can cancel every request it spawned.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    own: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            own: Arc::new(AtomicBool::new(false)),
            parent: Some(self.own.clone()),
        }
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.load(Ordering::SeqCst))
    }
}

/// One point of the forecast chart (1-based index over history then future)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub index: usize,
    pub actual_value: Option<f64>,
    pub predicted_value: Option<f64>,
}

/// A result delivered to the session, serialised as a single-key object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Emission {
    ChartEntries(Vec<ChartEntry>),
    Accuracy(f64),
    SustainabilityReport(SustainabilityReport),
    AdvisoryText(String),
    Message(String),
    Error(String),
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(Vec<Emission>),
    Errored {
        stage: PipelineStage,
        error: PipelineError,
    },
    /// The owner went away; nothing is emitted
    Cancelled { stage: PipelineStage },
}

impl PipelineOutcome {
    /// Emissions for the session: the full result, one error, or nothing
    pub fn into_emissions(self) -> Vec<Emission> {
        match self {
            PipelineOutcome::Completed(emissions) => emissions,
            PipelineOutcome::Errored { error, .. } => vec![Emission::Error(error.to_string())],
            PipelineOutcome::Cancelled { .. } => Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_))
    }

    /// Terminal state of the request (cancellation stops where it was)
    pub fn final_stage(&self) -> PipelineStage {
        match self {
            PipelineOutcome::Completed(_) => PipelineStage::Completed,
            PipelineOutcome::Errored { .. } => PipelineStage::Errored,
            PipelineOutcome::Cancelled { stage } => *stage,
        }
    }
}

/// Internal short-circuit: a fatal error or a cancellation
enum Halt {
    Failed(PipelineError),
    Cancelled,
}

impl From<PipelineError> for Halt {
    fn from(error: PipelineError) -> Self {
        Halt::Failed(error)
    }
}

impl From<crate::error::ModelError> for Halt {
    fn from(error: crate::error::ModelError) -> Self {
        Halt::Failed(error.into())
    }
}

struct RequestRun<'a> {
    stage: PipelineStage,
    cancel: &'a CancelFlag,
}

impl RequestRun<'_> {
    fn advance(&mut self, stage: PipelineStage) -> std::result::Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        debug!(from = ?self.stage, to = ?stage, "Stage transition");
        self.stage = stage;
        Ok(())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct PipelineOrchestrator {
    config: ForecastConfig,
    dataset: Arc<dyn DatasetProvider>,
    weights: Arc<dyn WeightProvider>,
    advisory: Arc<dyn AdvisoryTextService>,
}

impl PipelineOrchestrator {
    /// Validate the configuration and wire the collaborators
    pub fn new(
        config: ForecastConfig,
        dataset: Arc<dyn DatasetProvider>,
        weights: Arc<dyn WeightProvider>,
        advisory: Arc<dyn AdvisoryTextService>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dataset,
            weights,
            advisory,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Selectable columns (identifier omitted)
    pub fn connect_columns(&self) -> Result<Vec<String>> {
        let table = self.dataset.fetch()?;
        Ok(table.data_columns(&self.config.identifier_column))
    }

    /// Every column (identifier included) and every row
    pub fn full_dataset(&self) -> Result<TabularData> {
        Ok(self.dataset.fetch()?)
    }

    /// Run one request for `target_column`
    ///
    /// Never panics on bad input and never returns a partial result: the
    /// outcome is the full emission list, a single error, or a cancellation.
    pub fn process(&self, target_column: &str, cancel: &CancelFlag) -> PipelineOutcome {
        let started = Instant::now();
        let mut run = RequestRun {
            stage: PipelineStage::Idle,
            cancel,
        };

        match self.run(target_column, &mut run) {
            Ok(emissions) => {
                info!(
                    column = target_column,
                    emissions = emissions.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Processing complete"
                );
                PipelineOutcome::Completed(emissions)
            }
            Err(Halt::Failed(error)) => {
                error!(column = target_column, stage = ?run.stage, %error, "Processing failed");
                PipelineOutcome::Errored {
                    stage: run.stage,
                    error,
                }
            }
            Err(Halt::Cancelled) => {
                info!(column = target_column, stage = ?run.stage, "Processing cancelled");
                PipelineOutcome::Cancelled { stage: run.stage }
            }
        }
    }

    fn run(&self, target_column: &str, run: &mut RequestRun<'_>) -> std::result::Result<Vec<Emission>, Halt> {
        let config = &self.config;
        let table = self.dataset.fetch().map_err(PipelineError::from)?;

        // ====================================================================
        // Validate column
        // ====================================================================
        if target_column == config.identifier_column || !table.has_column(target_column) {
            return Err(PipelineError::ColumnNotFound(target_column.to_string()).into());
        }
        let target = TimeSeries::from_table(&table, target_column)
            .ok_or_else(|| PipelineError::InsufficientData(target_column.to_string()))?;
        run.advance(PipelineStage::ColumnValidated)?;
        info!(column = target_column, samples = target.len(), "Column validated");

        // ====================================================================
        // Features (history + synthetic future)
        // ====================================================================
        let profiler = PeakProfiler::new(config.min_peak_spacing, config.default_peak_spacing);
        let engine = ForecastEngine::new(
            config.horizon,
            FeatureBuilder::new(config.rolling_window),
            SyntheticSignalGenerator::new(config.noise_level, config.height_jitter),
        );

        let profile = profiler.profile(&target.values);
        debug!(
            avg_height = profile.avg_height,
            avg_spacing = profile.avg_spacing,
            "Peak profile"
        );
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let prepared = engine.prepare(&target.values, &profile, &mut rng)?;
        run.advance(PipelineStage::FeaturesBuilt)?;

        // ====================================================================
        // Train and forecast
        // ====================================================================
        let mut model = build_regressor(&config.model, config.training_seed());
        let trained = engine.train(&target.values, &prepared, model.as_mut())?;
        run.advance(PipelineStage::ModelTrained)?;

        let forecast = trained.forecast(&prepared)?;
        run.advance(PipelineStage::Forecasted)?;

        let accuracy = percent_accuracy(&target.values, &forecast.historical_fit);
        info!(column = target_column, accuracy, "Forecast complete");

        // ====================================================================
        // Score all minerals
        // ====================================================================
        let (mut predictions, mut history) = self.cheap_predictions(&table, target_column, &profiler, &engine);
        predictions.insert(target_column.to_string(), forecast.future.clone());
        history.insert(target_column.to_string(), target.clone());

        let names: Vec<String> = predictions.keys().cloned().collect();
        let weights = match self.weights.get_weights(&names) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(error = %e, "Weight acquisition failed, using uniform weights");
                uniform_weights(&names)
            }
        };

        let report = SustainabilityScorer::from_config(config).score(&predictions, &history, &weights)?;
        run.advance(PipelineStage::Scored)?;

        // ====================================================================
        // Assemble result
        // ====================================================================
        let advisory = match self.advisory.generate(&advisory_prompt(target_column, accuracy, &report)) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Advisory text omitted");
                None
            }
        };

        let mut emissions = vec![
            Emission::ChartEntries(chart_entries(&target.values, &forecast)),
            Emission::Accuracy(accuracy),
            Emission::SustainabilityReport(report),
        ];
        if let Some(text) = advisory {
            emissions.push(Emission::AdvisoryText(text));
        }
        emissions.push(Emission::Message(format!(
            "Processing complete for column: {}",
            target_column
        )));

        run.advance(PipelineStage::Completed)?;
        Ok(emissions)
    }

    /// Peak profile → synthetic signal for every mineral except the target
    ///
    /// Columns without a single numeric value are skipped.
    fn cheap_predictions(
        &self,
        table: &TabularData,
        target_column: &str,
        profiler: &PeakProfiler,
        engine: &ForecastEngine,
    ) -> (BTreeMap<String, Vec<f64>>, BTreeMap<String, TimeSeries>) {
        let config = &self.config;
        let minerals = table.data_columns(&config.identifier_column);

        let results: Vec<(TimeSeries, Vec<f64>)> = minerals
            .par_iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() != target_column)
            .filter_map(|(idx, name)| {
                let Some(series) = TimeSeries::from_table(table, name) else {
                    warn!(column = %name, "Skipping mineral with no numeric values");
                    return None;
                };
                let profile = profiler.profile(&series.values);
                let mut rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1 + idx as u64)),
                    None => StdRng::from_entropy(),
                };
                let future = engine.generator().generate_from_profile(engine.horizon(), &profile, &mut rng);
                Some((series, future))
            })
            .collect();

        let mut predictions = BTreeMap::new();
        let mut history = BTreeMap::new();
        for (series, future) in results {
            predictions.insert(series.name.clone(), future);
            history.insert(series.name.clone(), series);
        }
        (predictions, history)
    }
}

/// History entries carry actual and fitted values, future entries only predictions
pub fn chart_entries(actual: &[f64], forecast: &ForecastResult) -> Vec<ChartEntry> {
    let historical = actual
        .iter()
        .zip(&forecast.historical_fit)
        .map(|(a, p)| (Some(*a), Some(*p)));
    let future = forecast.future.iter().map(|p| (None, Some(*p)));

    historical
        .chain(future)
        .enumerate()
        .map(|(i, (actual_value, predicted_value))| ChartEntry {
            index: i + 1,
            actual_value,
            predicted_value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_entries_layout() {
        let forecast = ForecastResult {
            historical_fit: vec![1.1, 1.9],
            future: vec![3.0, 4.0, 5.0],
        };
        let entries = chart_entries(&[1.0, 2.0], &forecast);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[1].actual_value, Some(2.0));
        assert_eq!(entries[1].predicted_value, Some(1.9));
        assert_eq!(entries[2].actual_value, None);
        assert_eq!(entries[4].index, 5);
        assert_eq!(entries[4].predicted_value, Some(5.0));
    }

    #[test]
    fn test_emission_serialises_as_single_key_object() {
        let json = serde_json::to_value(Emission::Accuracy(97.5)).unwrap();
        assert_eq!(json, serde_json::json!({"accuracy": 97.5}));

        let json = serde_json::to_value(Emission::Error("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({"error": "boom"}));

        let entry = ChartEntry { index: 3, actual_value: None, predicted_value: Some(1.0) };
        let json = serde_json::to_value(Emission::ChartEntries(vec![entry])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"chartEntries": [{"index": 3, "actualValue": null, "predictedValue": 1.0}]})
        );
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_child_flag_follows_parent() {
        let session = CancelFlag::new();
        let request = session.child();
        let sibling = session.child();

        request.cancel();
        assert!(!session.is_cancelled());
        assert!(!sibling.is_cancelled());

        session.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn test_outcome_emissions() {
        let outcome = PipelineOutcome::Errored {
            stage: PipelineStage::Idle,
            error: PipelineError::ColumnNotFound("Au".into()),
        };
        assert_eq!(
            outcome.into_emissions(),
            vec![Emission::Error("Column 'Au' not found in dataset.".into())]
        );
        let cancelled = PipelineOutcome::Cancelled { stage: PipelineStage::Scored };
        assert!(cancelled.into_emissions().is_empty());
    }
}
