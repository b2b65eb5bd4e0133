// Normalization statistics over a set of images
//
// Single pass, one image in memory at a time. Per-image (count, mean, M2) are
// merged with the pairwise update of Chan et al.:
//
//   delta = mean_b - mean_a
//   mean  = mean_a + delta * n_b / n
//   M2    = M2_a + M2_b + delta^2 * n_a * n_b / n
//
// so the final deviation is the pooled standard deviation of every pixel,
// between-image spread included.

use serde::{Deserialize, Serialize};

use crate::dataset::ImageData;

/// Scalar statistics used to normalize training images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    pub average: f64,
    pub deviation: f64,
    pub min: f64,
    pub max: f64,
}

/// Streaming accumulator behind [`NormalizationParameters`].
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one image in, weighted by its number of values.
    pub fn push(&mut self, image: &ImageData) {
        let n_b = image.pixels.len();
        if n_b == 0 {
            return;
        }
        let mean_b = image.pixels.iter().sum::<f64>() / n_b as f64;
        let m2_b: f64 = image.pixels.iter().map(|v| (v - mean_b).powi(2)).sum();
        let (lo, hi) = image
            .pixels
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let n_a = self.count as f64;
        let n = n_a + n_b as f64;
        let delta = mean_b - self.mean;
        self.mean += delta * n_b as f64 / n;
        self.m2 += m2_b + delta * delta * n_a * n_b as f64 / n;
        self.count += n_b;
        self.min = Some(self.min.map_or(lo, |m| m.min(lo)));
        self.max = Some(self.max.map_or(hi, |m| m.max(hi)));
    }

    /// Number of values seen so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The statistics so far, or `None` before any value was pushed.
    pub fn finish(&self) -> Option<NormalizationParameters> {
        if self.count == 0 {
            return None;
        }
        Some(NormalizationParameters {
            average: self.mean,
            deviation: (self.m2 / self.count as f64).sqrt(),
            min: self.min.unwrap_or(0.0),
            max: self.max.unwrap_or(0.0),
        })
    }
}
