//! Utility modules shared across the forecasting pipeline
//!
//! - Stats: gap filling, differencing, rolling windows, sample deviations
//! - Normalization: min-max scaling with inverse transform

pub mod normalization;
pub mod stats;

pub use normalization::MinMaxScaler;
pub use stats::{diff_seeded, fill_forward_backward, mean, rolling_mean, rolling_std, sample_std};
