//! Data Loading and Management
//!
//! Soil measurement tables, the numeric series extracted from them, and the
//! dataset providers the pipeline fetches through. CSV files are parsed with
//! Polars and flattened into a plain row/column table so the rest of the
//! pipeline never depends on the dataframe engine.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DatasetError;
use crate::utils::fill_forward_backward;

// ============================================================================
// Tabular data
// ============================================================================

/// A single cell as read from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Numeric coercion: unparseable text and non-finite numbers are missing
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(x) if x.is_finite() => Some(*x),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Number(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Missing => serde_json::Value::Null,
        }
    }
}

/// Dataset as fetched: column names plus row-major cells
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabularData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// Build from column-major numeric data (missing samples as `None`)
    pub fn from_numeric_columns(columns: Vec<(String, Vec<Option<f64>>)>) -> Self {
        let height = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let names = columns.iter().map(|(name, _)| name.clone()).collect();
        let rows = (0..height)
            .map(|i| {
                columns
                    .iter()
                    .map(|(_, values)| match values.get(i).copied().flatten() {
                        Some(x) => CellValue::Number(x),
                        None => CellValue::Missing,
                    })
                    .collect()
            })
            .collect();
        Self { columns: names, rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Numerically coerced values of one column, `None` if the column is absent
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).and_then(CellValue::as_number))
                .collect(),
        )
    }

    /// Column names excluding the reserved identifier
    pub fn data_columns(&self, identifier_column: &str) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.as_str() != identifier_column)
            .cloned()
            .collect()
    }

    /// Rows as JSON records keyed by column name
    pub fn records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(j, name)| {
                        let value = row.get(j).map_or(serde_json::Value::Null, CellValue::to_json);
                        (name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

// ============================================================================
// Time series
// ============================================================================

/// Gap-free numeric samples of one column
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), values }
    }

    /// Forward-then-backward fill raw samples; `None` if nothing is numeric
    pub fn from_raw(name: impl Into<String>, raw: &[Option<f64>]) -> Option<Self> {
        fill_forward_backward(raw).map(|values| Self::new(name, values))
    }

    /// Extract and clean a column from a table
    pub fn from_table(table: &TabularData, column: &str) -> Option<Self> {
        let raw = table.numeric_column(column)?;
        Self::from_raw(column, &raw)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

// ============================================================================
// Dataset providers
// ============================================================================

/// Source of the soil measurement table
pub trait DatasetProvider: Send + Sync {
    fn fetch(&self) -> Result<TabularData, DatasetError>;
}

/// Reads a CSV file with Polars on every fetch
pub struct CsvDatasetProvider {
    path: PathBuf,
}

impl CsvDatasetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the CSV into a DataFrame
    fn load_frame(&self) -> Result<DataFrame, DatasetError> {
        let display = self.path.display().to_string();

        // Probe the file first so missing and forbidden files keep their kind
        File::open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DatasetError::NotFound(display.clone()),
            ErrorKind::PermissionDenied => DatasetError::AccessDenied(display.clone()),
            _ => DatasetError::Malformed(format!("{}: {}", display, e)),
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path.clone()))
            .map_err(|e| DatasetError::Malformed(format!("{}: {}", display, e)))?
            .finish()
            .map_err(|e| DatasetError::Malformed(format!("{}: {}", display, e)))
    }
}

impl DatasetProvider for CsvDatasetProvider {
    fn fetch(&self) -> Result<TabularData, DatasetError> {
        let df = self.load_frame()?;
        let table = dataframe_to_table(&df)?;
        tracing::debug!(
            "Loaded {} rows × {} columns from {:?}",
            table.height(),
            table.columns.len(),
            self.path
        );
        Ok(table)
    }
}

/// Flatten a DataFrame into row-major cells
///
/// String columns stay text (numeric coercion happens per request); every
/// other dtype is cast to Float64, falling back to its string rendering.
pub fn dataframe_to_table(df: &DataFrame) -> Result<TabularData, DatasetError> {
    let mut columns = Vec::with_capacity(df.width());
    let mut by_column: Vec<Vec<CellValue>> = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        columns.push(column.name().to_string());
        by_column.push(column_cells(column)?);
    }

    let rows = (0..df.height())
        .map(|i| {
            by_column
                .iter()
                .map(|cells| cells.get(i).cloned().unwrap_or(CellValue::Missing))
                .collect()
        })
        .collect();

    Ok(TabularData { columns, rows })
}

fn column_cells(column: &Column) -> Result<Vec<CellValue>, DatasetError> {
    let malformed = |e: PolarsError| DatasetError::Malformed(format!("column '{}': {}", column.name(), e));

    if column.dtype() == &DataType::String {
        return text_cells(column).map_err(malformed);
    }

    match column.cast(&DataType::Float64) {
        Ok(cast) => {
            let values = cast.f64().map_err(malformed)?;
            Ok(values
                .into_iter()
                .map(|v| match v {
                    Some(x) if x.is_finite() => CellValue::Number(x),
                    _ => CellValue::Missing,
                })
                .collect())
        }
        Err(_) => {
            let cast = column.cast(&DataType::String).map_err(malformed)?;
            text_cells(&cast).map_err(malformed)
        }
    }
}

fn text_cells(column: &Column) -> PolarsResult<Vec<CellValue>> {
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map_or(CellValue::Missing, |s| CellValue::Text(s.to_string())))
        .collect())
}

/// Fixed in-memory table (tests, benchmarks, embedding callers)
#[derive(Debug, Clone)]
pub struct InMemoryDatasetProvider {
    table: TabularData,
}

impl InMemoryDatasetProvider {
    pub fn new(table: TabularData) -> Self {
        Self { table }
    }
}

impl DatasetProvider for InMemoryDatasetProvider {
    fn fetch(&self) -> Result<TabularData, DatasetError> {
        Ok(self.table.clone())
    }
}

/// Try a primary source (e.g. remote storage), then a local copy
pub struct FallbackDatasetProvider {
    primary: Arc<dyn DatasetProvider>,
    fallback: Arc<dyn DatasetProvider>,
}

impl FallbackDatasetProvider {
    pub fn new(primary: Arc<dyn DatasetProvider>, fallback: Arc<dyn DatasetProvider>) -> Self {
        Self { primary, fallback }
    }
}

impl DatasetProvider for FallbackDatasetProvider {
    fn fetch(&self) -> Result<TabularData, DatasetError> {
        match self.primary.fetch() {
            Ok(table) => Ok(table),
            Err(primary_err) => {
                tracing::warn!("Primary dataset fetch failed ({}), trying local copy", primary_err);
                self.fallback.fetch().map_err(|fallback_err| {
                    tracing::warn!("Local dataset fetch failed: {}", fallback_err);
                    primary_err
                })
            }
        }
    }
}
