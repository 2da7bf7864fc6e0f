//! Linear regression strategy
//!
//! Ordinary least squares with intercept over the three features, solved via
//! the normal equations. A tiny ridge term on the feature coefficients keeps
//! collinear or constant feature columns solvable.

use serde::{Deserialize, Serialize};

use super::{check_training_set, FeatureRow, Regressor};
use crate::error::ModelError;

const RIDGE: f64 = 1e-8;
const DIM: usize = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegressor {
    intercept: f64,
    coefficients: [f64; 3],
    fitted: bool,
}

impl LinearRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> [f64; 3] {
        self.coefficients
    }

    fn predict_row(&self, row: &FeatureRow) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, b)| x * b)
                .sum::<f64>()
    }
}

impl Regressor for LinearRegressor {
    fn fit(&mut self, x: &[FeatureRow], y: &[f64]) -> Result<(), ModelError> {
        check_training_set(x, y)?;

        // Normal equations over the augmented design [1, x0, x1, x2]
        let mut xtx = [[0.0; DIM]; DIM];
        let mut xty = [0.0; DIM];
        for (row, target) in x.iter().zip(y) {
            let augmented = [1.0, row[0], row[1], row[2]];
            for i in 0..DIM {
                xty[i] += augmented[i] * target;
                for j in 0..DIM {
                    xtx[i][j] += augmented[i] * augmented[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += RIDGE;
        }

        let beta = solve(xtx, xty)?;
        self.intercept = beta[0];
        self.coefficients = [beta[1], beta[2], beta[3]];
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
        if !self.fitted {
            return Err(ModelError::NotFitted);
        }
        Ok(x.iter().map(|row| self.predict_row(row)).collect())
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: [[f64; DIM]; DIM], mut b: [f64; DIM]) -> Result<[f64; DIM], ModelError> {
    for col in 0..DIM {
        let pivot = (col..DIM)
            .max_by(|&i, &j| {
                a[i][col]
                    .abs()
                    .partial_cmp(&a[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);

        if !a[pivot][col].is_finite() || a[pivot][col].abs() < 1e-14 {
            return Err(ModelError::Numerical("singular matrix in regression".to_string()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..DIM {
            let factor = a[row][col] / a[col][col];
            for k in col..DIM {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = [0.0; DIM];
    for row in (0..DIM).rev() {
        let tail: f64 = ((row + 1)..DIM).map(|k| a[row][k] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[row][row];
    }
    Ok(solution)
}
