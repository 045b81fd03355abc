//! Stereo-relationship descriptors. These always receive at least two
//! channels; the pipeline promotes mono sources to dual-mono, for which
//! side energy is zero and channel correlation is 1.0.

use crate::audio::AudioBuffer;
use crate::extractors::{mean_stdev, pearson, EPSILON};
use crate::pipeline::{ChannelMode, Extractor};

/// Side/mid energy ratio (spectral stereo width proxy) and left/right
/// power imbalance.
pub struct StereoFeatures {
    names: Vec<String>,
}

impl StereoFeatures {
    pub fn new() -> Self {
        Self {
            names: vec!["side_mid_ratio".to_string(), "lr_imbalance".to_string()],
        }
    }
}

impl Default for StereoFeatures {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for StereoFeatures {
    fn name(&self) -> &str {
        "stereo_features"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Stereo
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let left = &audio.channels[0];
        let right = &audio.channels[1];
        let n = left.len().min(right.len());
        if n == 0 {
            return vec![0.0, 0.0];
        }

        let mut side_energy = 0.0f64;
        let mut mid_energy = 0.0f64;
        let mut left_power = 0.0f64;
        let mut right_power = 0.0f64;
        for i in 0..n {
            let l = left[i] as f64;
            let r = right[i] as f64;
            side_energy += (l - r) * (l - r);
            mid_energy += (l + r) * (l + r);
            left_power += l * l;
            right_power += r * r;
        }

        let side_mid_ratio = if mid_energy < EPSILON {
            0.0
        } else {
            side_energy / mid_energy
        };
        let total_power = left_power + right_power;
        let lr_imbalance = if total_power < EPSILON {
            0.0
        } else {
            (right_power - left_power) / total_power
        };
        vec![side_mid_ratio, lr_imbalance]
    }
}

/// Normalized cross-correlation between left and right channels, either
/// over the whole signal or pooled over fixed-length windows. Unlike the
/// windowed crest factor, pooling here includes the trailing partial
/// window, so an out-of-phase ending still shows up in the mean.
/// Degenerate windows (silence, dual-mono with zero variance) report full
/// coherence, 1.0.
pub struct PhaseCorrelation {
    frame_size: Option<usize>,
    names: Vec<String>,
}

impl PhaseCorrelation {
    pub fn full_signal() -> Self {
        Self {
            frame_size: None,
            names: vec!["phase_correlation".to_string()],
        }
    }

    pub fn framed(frame_size: usize) -> Self {
        Self {
            frame_size: Some(frame_size.max(1)),
            names: super::pooled_names("phase_correlation"),
        }
    }

    fn correlation(left: &[f32], right: &[f32]) -> f64 {
        pearson(left, right).unwrap_or(1.0)
    }
}

impl Extractor for PhaseCorrelation {
    fn name(&self) -> &str {
        "phase_correlation"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Stereo
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let left = &audio.channels[0];
        let right = &audio.channels[1];
        let n = left.len().min(right.len());

        match self.frame_size {
            None => vec![Self::correlation(&left[..n], &right[..n])],
            Some(frame_size) => {
                let correlations: Vec<f64> = left[..n]
                    .chunks(frame_size)
                    .zip(right[..n].chunks(frame_size))
                    .map(|(l, r)| Self::correlation(l, r))
                    .collect();
                if correlations.is_empty() {
                    return vec![1.0, 0.0];
                }
                let (mean, stdev) = mean_stdev(&correlations);
                vec![mean, stdev]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(hz: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
        let rate = 44100.0;
        (0..(rate * seconds) as usize)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * hz * i as f32 / rate).sin())
            .collect()
    }

    fn dual_mono(seconds: f32) -> AudioBuffer {
        let plane = sine(440.0, seconds, 0.5);
        AudioBuffer::new(vec![plane.clone(), plane], 44100)
    }

    #[test]
    fn dual_mono_has_zero_width_and_full_correlation() {
        let buffer = dual_mono(1.0);
        assert_eq!(StereoFeatures::new().compute(&buffer), vec![0.0, 0.0]);
        assert!(
            (PhaseCorrelation::full_signal().compute(&buffer)[0] - 1.0).abs() < 1e-9
        );
    }

    #[test]
    fn inverted_channels_have_negative_correlation() {
        let left = sine(440.0, 1.0, 0.5);
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let buffer = AudioBuffer::new(vec![left, right], 44100);
        let values = PhaseCorrelation::full_signal().compute(&buffer);
        assert!((values[0] + 1.0).abs() < 1e-6);

        // out-of-phase signal is all side, no mid
        let stereo = StereoFeatures::new().compute(&buffer);
        assert!(stereo[0] > 1000.0);
    }

    #[test]
    fn imbalance_reflects_channel_power() {
        let left = sine(440.0, 1.0, 0.1);
        let right = sine(440.0, 1.0, 0.8);
        let values = StereoFeatures::new().compute(&AudioBuffer::new(vec![left, right], 44100));
        assert!(values[1] > 0.9, "right-heavy signal, got {}", values[1]);
    }

    #[test]
    fn silence_reports_coherent_sentinels() {
        let buffer = AudioBuffer::new(vec![vec![0.0; 1000], vec![0.0; 1000]], 44100);
        assert_eq!(StereoFeatures::new().compute(&buffer), vec![0.0, 0.0]);
        assert_eq!(
            PhaseCorrelation::full_signal().compute(&buffer),
            vec![1.0]
        );
    }

    #[test]
    fn framed_correlation_keeps_arity_below_window_length() {
        let extractor = PhaseCorrelation::framed(44100);
        for buffer in [
            dual_mono(0.01),
            dual_mono(2.0),
            AudioBuffer::new(vec![vec![0.5], vec![0.5]], 44100),
        ] {
            assert_eq!(
                extractor.compute(&buffer).len(),
                extractor.header_names().len()
            );
        }
    }

    #[test]
    fn framed_correlation_includes_the_trailing_partial_window() {
        // one full in-phase window plus a two-sample anti-phase remainder
        let left: Vec<f32> = vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0];
        let right: Vec<f32> = vec![0.0, 1.0, 2.0, 3.0, 1.0, 0.0];
        let values =
            PhaseCorrelation::framed(4).compute(&AudioBuffer::new(vec![left, right], 44100));
        // windows correlate +1 and -1, so the remainder pulls the mean to 0
        assert!(values[0].abs() < 1e-9);
        assert!((values[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn windowed_instances_have_distinct_headers() {
        let full = PhaseCorrelation::full_signal();
        let framed = PhaseCorrelation::framed(44100);
        assert_ne!(full.header_names(), framed.header_names());
    }
}
