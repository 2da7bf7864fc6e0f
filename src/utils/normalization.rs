//! Normalization Utilities
//!
//! Column-wise min-max scaling to [0, 1] with retained parameters so model
//! outputs can be mapped back to concentration units.

use serde::{Deserialize, Serialize};

/// Fitted min-max parameters for one or more columns
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    /// max - min, with constant columns stored as 1.0
    range: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on row-major data (every row the same width)
    pub fn fit<const N: usize>(rows: &[[f64; N]]) -> Self {
        let mut min = vec![f64::INFINITY; N];
        let mut max = vec![f64::NEG_INFINITY; N];

        for row in rows {
            for (j, v) in row.iter().enumerate() {
                if v.is_finite() {
                    min[j] = min[j].min(*v);
                    max[j] = max[j].max(*v);
                }
            }
        }

        let mut range = Vec::with_capacity(N);
        for j in 0..N {
            if !min[j].is_finite() {
                // Column with no finite values
                min[j] = 0.0;
                max[j] = 0.0;
            }
            let r = max[j] - min[j];
            range.push(if r > 0.0 { r } else { 1.0 });
        }

        Self { min, range }
    }

    /// Fit on a single column
    pub fn fit_column(values: &[f64]) -> Self {
        let rows: Vec<[f64; 1]> = values.iter().map(|v| [*v]).collect();
        Self::fit(&rows)
    }

    pub fn transform<const N: usize>(&self, rows: &[[f64; N]]) -> Vec<[f64; N]> {
        rows.iter()
            .map(|row| {
                let mut out = [0.0; N];
                for j in 0..N.min(self.min.len()) {
                    out[j] = (row[j] - self.min[j]) / self.range[j];
                }
                out
            })
            .collect()
    }

    pub fn transform_column(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.min[0]) / self.range[0]).collect()
    }

    pub fn inverse_transform_column(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.range[0] + self.min[0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_column_scaling_inverts() {
        let values = [10.0, 20.0, 30.0];
        let scaler = MinMaxScaler::fit_column(&values);
        let scaled = scaler.transform_column(&values);
        assert_eq!(scaled, vec![0.0, 0.5, 1.0]);

        let restored = scaler.inverse_transform_column(&[0.25, 1.5]);
        assert_relative_eq!(restored[0], 15.0);
        assert_relative_eq!(restored[1], 40.0);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let rows = [[3.0, 1.0], [3.0, 5.0]];
        let scaler = MinMaxScaler::fit(&rows);
        let scaled = scaler.transform(&rows);
        assert_eq!(scaled[0], [0.0, 0.0]);
        assert_eq!(scaled[1], [0.0, 1.0]);
        // Out-of-range values extrapolate instead of clipping
        assert_relative_eq!(scaler.transform(&[[4.0, 9.0]])[0][1], 2.0);
    }
}
