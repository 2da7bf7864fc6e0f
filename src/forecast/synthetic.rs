//! Synthetic signal generation
//!
//! Builds a future series with the same peak statistics as an observed one:
//! a train of Gaussian bumps (one every `spacing` samples, heights jittered)
//! plus white noise scaled to the average peak height.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::peaks::PeakProfile;

#[derive(Debug, Clone)]
pub struct SyntheticSignalGenerator {
    /// Noise std as a fraction of the average peak height
    pub noise_level: f64,
    /// Relative std of each bump's height
    pub height_jitter: f64,
}

impl Default for SyntheticSignalGenerator {
    fn default() -> Self {
        Self {
            noise_level: 0.2,
            height_jitter: 0.2,
        }
    }
}

impl SyntheticSignalGenerator {
    pub fn new(noise_level: f64, height_jitter: f64) -> Self {
        Self {
            noise_level,
            height_jitter,
        }
    }

    /// Generate from a peak profile
    pub fn generate_from_profile<R: Rng + ?Sized>(
        &self,
        len: usize,
        profile: &PeakProfile,
        rng: &mut R,
    ) -> Vec<f64> {
        self.generate(len, profile.avg_height, profile.avg_spacing, rng)
    }

    /// Generate exactly `len` samples
    ///
    /// Any spacing (zero, fractional, negative, non-finite) is coerced to a
    /// whole number of samples ≥ 1.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        len: usize,
        avg_height: f64,
        avg_spacing: f64,
        rng: &mut R,
    ) -> Vec<f64> {
        if len == 0 {
            return Vec::new();
        }

        let spacing = coerce_spacing(avg_spacing);
        let width = spacing as f64 / 5.0;
        let two_var = 2.0 * width * width;

        // Evenly spaced positions over [0, len]
        let step = if len > 1 { len as f64 / (len - 1) as f64 } else { 0.0 };
        let positions: Vec<f64> = (0..len).map(|k| k as f64 * step).collect();

        let mut signal = vec![0.0; len];
        let jitter = normal_or_none(self.height_jitter);

        let mut center = 0usize;
        while center < len {
            let factor = jitter.as_ref().map_or(0.0, |d| d.sample(rng));
            let height = avg_height * (1.0 + factor);
            let c = center as f64;
            for (out, x) in signal.iter_mut().zip(&positions) {
                *out += height * (-(x - c).powi(2) / two_var).exp();
            }
            center += spacing;
        }

        if let Some(noise) = normal_or_none(self.noise_level * avg_height.abs()) {
            for out in signal.iter_mut() {
                *out += noise.sample(rng);
            }
        }

        signal
    }
}

/// `max(1, round(spacing))`, non-finite values become 1
pub fn coerce_spacing(spacing: f64) -> usize {
    if !spacing.is_finite() {
        return 1;
    }
    let rounded = spacing.round();
    if rounded < 1.0 {
        1
    } else {
        rounded as usize
    }
}

/// Zero-mean normal, `None` when the std would make the draw a no-op or invalid
fn normal_or_none(std_dev: f64) -> Option<Normal<f64>> {
    if !std_dev.is_finite() || std_dev <= 0.0 {
        return None;
    }
    Normal::new(0.0, std_dev).ok()
}
