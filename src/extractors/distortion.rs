//! Clipping/distortion estimate built on the shape of the sample amplitude
//! probability mass function: a heavily clipped signal piles mass at the
//! histogram edges, and its PMF derivative stops resembling the smooth
//! Gaussian of an undistorted program.

use crate::audio::AudioBuffer;
use crate::extractors::{distribution_stats, flatness, pearson};
use crate::pipeline::{ChannelMode, Extractor};

const HISTOGRAM_BINS: usize = 1001;
const GAUSS_SIGMA: f64 = 0.2;

pub struct Distortion {
    names: Vec<String>,
    gauss_reference: Vec<f64>,
}

impl Distortion {
    pub fn new() -> Self {
        // Gaussian pdf sampled over [-1, 1], compared against the PMF
        // derivative to estimate how "natural" the amplitude distribution is
        let points = HISTOGRAM_BINS - 1;
        let norm = 1.0 / (GAUSS_SIGMA * (2.0 * std::f64::consts::PI).sqrt());
        let gauss_reference = (0..points)
            .map(|i| {
                let x = -1.0 + 2.0 * i as f64 / (points - 1) as f64;
                norm * (-x * x / (2.0 * GAUSS_SIGMA * GAUSS_SIGMA)).exp()
            })
            .collect();
        Self {
            names: [
                "pmf_centroid",
                "pmf_spread",
                "pmf_skewness",
                "pmf_kurtosis",
                "pmf_flatness",
                "pmf_gauss",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            gauss_reference,
        }
    }

    /// Amplitude histogram over [-1, 1]; out-of-range samples are ignored.
    fn histogram(samples: &[f32]) -> Vec<f64> {
        let mut histogram = vec![0.0f64; HISTOGRAM_BINS];
        for &sample in samples {
            let s = sample as f64;
            if (-1.0..=1.0).contains(&s) {
                let index = (((s + 1.0) / 2.0) * HISTOGRAM_BINS as f64) as usize;
                histogram[index.min(HISTOGRAM_BINS - 1)] += 1.0;
            }
        }
        histogram
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for Distortion {
    fn name(&self) -> &str {
        "distortion"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Mono
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let samples = audio.channels.first().map_or(&[][..], |c| c.as_slice());
        let histogram = Self::histogram(samples);

        let (centroid, spread, skewness, kurtosis) = distribution_stats(&histogram, 1.0);
        let pmf_flatness = flatness(&histogram);

        let derivative: Vec<f64> = histogram
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs())
            .collect();
        let r_squared = pearson(&derivative, &self.gauss_reference)
            .map_or(0.0, |r| r * r);

        vec![centroid, spread, skewness, kurtosis, pmf_flatness, r_squared]
    }
}
