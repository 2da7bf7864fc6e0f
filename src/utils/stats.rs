//! Series statistics
//!
//! Gap filling, differencing and trailing-window statistics shared by the
//! feature builder, peak profiler and scorer. Standard deviations are sample
//! deviations (ddof = 1) throughout.

/// Mean of the finite values, `None` when there are none
pub fn mean(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.iter().filter(|v| v.is_finite()) {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Sample standard deviation of the finite values, `None` below two samples
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let m = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    Some(var.sqrt())
}

/// Largest finite value
pub fn max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
}

/// Smallest finite value
pub fn min(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}

/// Forward fill then backward fill missing samples
///
/// Returns `None` when every sample is missing.
pub fn fill_forward_backward(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = values.iter().flatten().copied().find(|v| v.is_finite())?;

    let mut out = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;
    for v in values {
        match v {
            Some(x) if x.is_finite() => {
                last = Some(*x);
                out.push(*x);
            }
            // Leading gaps take the first observed value (the backward fill)
            _ => out.push(last.unwrap_or(first)),
        }
    }
    Some(out)
}

/// First difference; element 0 is `values[0] - seed`, or 0 without a seed
pub fn diff_seeded(values: &[f64], seed: Option<f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        if i == 0 {
            out.push(seed.map_or(0.0, |s| v - s));
        } else {
            out.push(v - values[i - 1]);
        }
    }
    out
}

/// Trailing-window mean with an expanding start (minimum one sample)
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Trailing-window sample std with an expanding start
///
/// Entries with fewer than two samples in the window are `None`.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            sample_std(&values[start..=i])
        })
        .collect()
}
