//! External collaborators: weight sources and advisory text
//!
//! Both are optional enrichments. Weight failures make the orchestrator fall
//! back to uniform weights; advisory failures drop the advisory emission.
//! Neither ever aborts a request.
//!
//! Weight responses from a text service are untrusted. They are parsed as
//! strict JSON and validated against the requested names; nothing in them is
//! ever evaluated.

use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AdvisoryError, WeightError};
use crate::scorer::{MineralWeightMap, SustainabilityReport};

// ============================================================================
// Weights
// ============================================================================

/// Source of per-mineral importance weights
pub trait WeightProvider: Send + Sync {
    fn get_weights(&self, names: &[String]) -> Result<MineralWeightMap, WeightError>;
}

/// `1/n` for every name
pub fn uniform_weights(names: &[String]) -> MineralWeightMap {
    if names.is_empty() {
        return MineralWeightMap::new();
    }
    let weight = 1.0 / names.len() as f64;
    names.iter().map(|n| (n.clone(), weight)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct UniformWeights;

impl WeightProvider for UniformWeights {
    fn get_weights(&self, names: &[String]) -> Result<MineralWeightMap, WeightError> {
        Ok(uniform_weights(names))
    }
}

/// Fixed weights; every requested name must be present
#[derive(Debug, Clone)]
pub struct StaticWeights {
    weights: MineralWeightMap,
}

impl StaticWeights {
    pub fn new(weights: MineralWeightMap) -> Self {
        Self { weights }
    }
}

impl WeightProvider for StaticWeights {
    fn get_weights(&self, names: &[String]) -> Result<MineralWeightMap, WeightError> {
        names
            .iter()
            .map(|name| {
                let weight = self
                    .weights
                    .get(name)
                    .copied()
                    .ok_or_else(|| WeightError::Malformed(format!("no weight for '{}'", name)))?;
                Ok((name.clone(), check_weight(name, weight)?))
            })
            .collect()
    }
}

/// Weight map read from a JSON object file on every request
#[derive(Debug, Clone)]
pub struct JsonFileWeights {
    path: PathBuf,
}

impl JsonFileWeights {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeightProvider for JsonFileWeights {
    fn get_weights(&self, names: &[String]) -> Result<MineralWeightMap, WeightError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            WeightError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        parse_weight_response(&contents, names)
    }
}

/// Weights requested from an advisory text service as a JSON object
pub struct AdvisoryWeightProvider {
    service: Arc<dyn AdvisoryTextService>,
}

impl AdvisoryWeightProvider {
    pub fn new(service: Arc<dyn AdvisoryTextService>) -> Self {
        Self { service }
    }
}

impl WeightProvider for AdvisoryWeightProvider {
    fn get_weights(&self, names: &[String]) -> Result<MineralWeightMap, WeightError> {
        let response = self
            .service
            .generate(&weight_prompt(names))
            .map_err(|e| WeightError::Unavailable(e.to_string()))?;
        parse_weight_response(&response, names)
    }
}

pub fn weight_prompt(names: &[String]) -> String {
    format!(
        "Assign an importance weight to each mineral for a mining sustainability assessment. \
         Respond with only a JSON object mapping every mineral name to a non-negative number.\n\
         Minerals: {}",
        names.join(", ")
    )
}

/// Strictly parse a weight map out of a text response
///
/// Accepts a single JSON object, optionally wrapped in a ``` or ```json
/// fence. Every requested name must map to a finite, non-negative number.
/// Keys that were not requested are ignored.
pub fn parse_weight_response(text: &str, names: &[String]) -> Result<MineralWeightMap, WeightError> {
    let body = strip_code_fence(text);

    let value: Value = serde_json::from_str(body)
        .map_err(|e| WeightError::Malformed(format!("not valid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| WeightError::Malformed("expected a JSON object".to_string()))?;

    names
        .iter()
        .map(|name| {
            let entry = object
                .get(name)
                .ok_or_else(|| WeightError::Malformed(format!("no weight for '{}'", name)))?;
            let weight = entry
                .as_f64()
                .ok_or_else(|| WeightError::Malformed(format!("weight for '{}' is not a number", name)))?;
            Ok((name.clone(), check_weight(name, weight)?))
        })
        .collect()
}

fn check_weight(name: &str, weight: f64) -> Result<f64, WeightError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(weight)
    } else {
        Err(WeightError::Malformed(format!(
            "weight for '{}' must be a finite non-negative number",
            name
        )))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ============================================================================
// Advisory text
// ============================================================================

/// Narrative text generation from a prompt
pub trait AdvisoryTextService: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, AdvisoryError>;
}

impl<F> AdvisoryTextService for F
where
    F: Fn(&str) -> Result<String, AdvisoryError> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<String, AdvisoryError> {
        self(prompt)
    }
}

/// No advisory service configured
#[derive(Debug, Clone, Default)]
pub struct DisabledAdvisory;

impl AdvisoryTextService for DisabledAdvisory {
    fn generate(&self, _prompt: &str) -> Result<String, AdvisoryError> {
        Err(AdvisoryError::Unavailable("advisory text is disabled".to_string()))
    }
}

const AVERAGE_SCORE_LABEL: &str = "Average sustainability score:";
const CONTINUE_THRESHOLD: f64 = 7.0;
const MONITOR_THRESHOLD: f64 = 4.0;

/// Local, deterministic recommendation from the report summary in the prompt
#[derive(Debug, Clone, Default)]
pub struct ReportSummaryAdvisory;

impl AdvisoryTextService for ReportSummaryAdvisory {
    fn generate(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let average = prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix(AVERAGE_SCORE_LABEL))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .ok_or_else(|| {
                AdvisoryError::Unavailable("prompt carries no report summary".to_string())
            })?;

        let recommendation = if average >= CONTINUE_THRESHOLD {
            "Continue mining: forecast concentrations stay close to historical norms."
        } else if average >= MONITOR_THRESHOLD {
            "Monitor closely: forecast concentrations drift noticeably from historical norms."
        } else {
            "Halt or reduce extraction: forecast concentrations deviate strongly from historical norms."
        };

        Ok(format!(
            "Average sustainability score {:.2}/10. {}",
            average, recommendation
        ))
    }
}

/// Prompt describing one processed column for the advisory service
pub fn advisory_prompt(column: &str, accuracy: f64, report: &SustainabilityReport) -> String {
    let meta = &report.metadata;
    format!(
        "Should mining continue given these forecasts?\n\
         Target column: {}\n\
         Model accuracy: {:.2}%\n\
         {} {:.2}\n\
         Overall trend: {:.2}\n\
         Score range: {:.2} to {:.2} over {} periods",
        column,
        accuracy,
        AVERAGE_SCORE_LABEL,
        meta.average_score,
        meta.overall_trend,
        meta.min_score,
        meta.max_score,
        meta.total_periods,
    )
}
