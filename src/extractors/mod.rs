//! The standard feature-extractor catalogue and the statistics helpers the
//! pooled extractors share.

pub mod distortion;
pub mod dynamics;
pub mod spectral;
pub mod stereo;

pub use distortion::Distortion;
pub use dynamics::{CrestFactor, DynamicSpread, Loudness};
pub use spectral::{Spectral, SpectralFlux, ZeroCrossingRate};
pub use stereo::{PhaseCorrelation, StereoFeatures};

use crate::error::Error;
use crate::pipeline::PipelineBuilder;

/// Numerical stability epsilon
pub(crate) const EPSILON: f64 = 1e-10;

/// Register the full descriptor catalogue in its fixed order. The windowed
/// crest-factor and phase-correlation instances are renamed so the three
/// time resolutions stay distinguishable in the header.
pub fn register_standard(builder: &mut PipelineBuilder, sample_rate: u32) -> Result<(), Error> {
    let one_second = sample_rate as usize;
    let hundred_ms = (sample_rate as usize / 10).max(1);

    builder
        .register(Spectral::new(sample_rate))
        .register(SpectralFlux::new())
        .register(ZeroCrossingRate::new())
        .register(CrestFactor::full_signal());
    builder.register_renamed(
        CrestFactor::framed(one_second),
        pooled_names("crest_factor_1s"),
    )?;
    builder.register_renamed(
        CrestFactor::framed(hundred_ms),
        pooled_names("crest_factor_100ms"),
    )?;
    builder
        .register(Loudness::new(sample_rate))
        .register(DynamicSpread::new())
        .register(Distortion::new())
        .register(StereoFeatures::new())
        .register(PhaseCorrelation::full_signal());
    builder.register_renamed(
        PhaseCorrelation::framed(one_second),
        pooled_names("phase_correlation_1s"),
    )?;
    builder.register_renamed(
        PhaseCorrelation::framed(hundred_ms),
        pooled_names("phase_correlation_100ms"),
    )?;
    Ok(())
}

pub(crate) fn pooled_names(base: &str) -> Vec<String> {
    vec![format!("{base}.mean"), format!("{base}.stdev")]
}

/// Mean and population standard deviation. Empty input yields the (0, 0)
/// sentinel so pooled extractors keep their arity on short buffers.
pub(crate) fn mean_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Linear-interpolated percentile, `pct` in [0, 100]. Empty input yields 0.
pub(crate) fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Centroid, spread, skewness, and excess kurtosis of a weighted
/// distribution whose support is `n` evenly spaced positions over
/// `[0, range]`. Zero total weight yields all-zero shape values; zero
/// spread yields skewness 0 and kurtosis -3.
pub(crate) fn distribution_stats(weights: &[f64], range: f64) -> (f64, f64, f64, f64) {
    let n = weights.len();
    let total: f64 = weights.iter().sum();
    if n < 2 || total < EPSILON {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let step = range / (n - 1) as f64;

    let centroid = weights
        .iter()
        .enumerate()
        .map(|(i, w)| i as f64 * step * w)
        .sum::<f64>()
        / total;

    let mut m2 = 0.0;
    let mut m3 = 0.0;
    let mut m4 = 0.0;
    for (i, w) in weights.iter().enumerate() {
        let d = i as f64 * step - centroid;
        m2 += d * d * w;
        m3 += d * d * d * w;
        m4 += d * d * d * d * w;
    }
    m2 /= total;
    m3 /= total;
    m4 /= total;

    let (skewness, kurtosis) = if m2 < EPSILON {
        (0.0, -3.0)
    } else {
        (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
    };
    (centroid, m2, skewness, kurtosis)
}

/// Ratio of geometric to arithmetic mean. Any zero weight drives the
/// geometric mean, and therefore the flatness, to zero.
pub(crate) fn flatness(weights: &[f64]) -> f64 {
    if weights.is_empty() {
        return 0.0;
    }
    let arithmetic = weights.iter().sum::<f64>() / weights.len() as f64;
    if arithmetic < EPSILON {
        return 0.0;
    }
    if weights.iter().any(|&w| w <= 0.0) {
        return 0.0;
    }
    let log_sum: f64 = weights.iter().map(|w| w.ln()).sum();
    let geometric = (log_sum / weights.len() as f64).exp();
    geometric / arithmetic
}

/// Pearson correlation coefficient. `None` when either side has
/// near-zero variance; callers choose the degenerate-input sentinel.
pub(crate) fn pearson<T: Copy + Into<f64>>(a: &[T], b: &[T]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let mean_a = a[..n].iter().map(|&v| v.into()).sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().map(|&v| v.into()).sum::<f64>() / n as f64;

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i].into() - mean_a;
        let db = b[i].into() - mean_b;
        covariance += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denominator = (var_a * var_b).sqrt();
    if denominator < EPSILON {
        return None;
    }
    Some(covariance / denominator)
}
