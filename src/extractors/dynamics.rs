//! Dynamics and loudness descriptors: crest factor, dynamic spread, and the
//! EBU R128 loudness set.

use ebur128::{EbuR128, Mode};
use log::warn;

use crate::audio::AudioBuffer;
use crate::extractors::{mean_stdev, percentile, EPSILON};
use crate::pipeline::{ChannelMode, Extractor};

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_of_squares / samples.len() as f64).sqrt()
}

fn peak(samples: &[f32]) -> f64 {
    samples.iter().fold(0.0f64, |m, &s| m.max(s.abs() as f64))
}

/// Peak-to-RMS ratio, either over the whole signal or pooled as mean/stdev
/// over fixed-size windows. Only complete windows are pooled; a trailing
/// remainder shorter than the window is dropped. This differs from the
/// windowed phase correlation, which keeps its remainder. Silent windows
/// contribute the 0.0 sentinel.
pub struct CrestFactor {
    frame_size: Option<usize>,
    names: Vec<String>,
}

impl CrestFactor {
    pub fn full_signal() -> Self {
        Self {
            frame_size: None,
            names: vec!["crest_factor".to_string()],
        }
    }

    pub fn framed(frame_size: usize) -> Self {
        Self {
            frame_size: Some(frame_size.max(1)),
            names: super::pooled_names("crest_factor"),
        }
    }

    fn crest(samples: &[f32]) -> f64 {
        let rms = rms(samples);
        if rms < EPSILON {
            return 0.0;
        }
        peak(samples) / rms
    }
}

impl Extractor for CrestFactor {
    fn name(&self) -> &str {
        "crest_factor"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Mono
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let samples = audio.channels.first().map_or(&[][..], |c| c.as_slice());
        match self.frame_size {
            None => vec![Self::crest(samples)],
            Some(frame_size) => {
                let crests: Vec<f64> = samples
                    .chunks_exact(frame_size)
                    .map(Self::crest)
                    .collect();
                let (mean, stdev) = mean_stdev(&crests);
                vec![mean, stdev]
            }
        }
    }
}

/// Average absolute deviation of per-frame loudness from its mean, a
/// loudness-spread measure over 2048-sample frames.
pub struct DynamicSpread {
    frame_size: usize,
    names: Vec<String>,
}

impl DynamicSpread {
    pub fn new() -> Self {
        Self {
            frame_size: 2048,
            names: vec!["dynamic_spread".to_string()],
        }
    }
}

impl Default for DynamicSpread {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for DynamicSpread {
    fn name(&self) -> &str {
        "dynamic_spread"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Mono
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let samples = audio.channels.first().map_or(&[][..], |c| c.as_slice());
        let frame_db: Vec<f64> = samples
            .chunks_exact(self.frame_size)
            .map(|frame| 20.0 * rms(frame).max(EPSILON).log10())
            .collect();
        if frame_db.is_empty() {
            return vec![0.0];
        }
        let mean = frame_db.iter().sum::<f64>() / frame_db.len() as f64;
        let spread =
            frame_db.iter().map(|db| (db - mean).abs()).sum::<f64>() / frame_db.len() as f64;
        vec![spread]
    }
}

/// EBU R128 loudness descriptors: loudness range, microdynamics (momentary
/// minus short-term loudness, 95th percentile and maximum), true-peak to
/// integrated-loudness ratio, and the fraction of samples within 1 dB of
/// full scale.
pub struct Loudness {
    sample_rate: u32,
    names: Vec<String>,
}

impl Loudness {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            names: [
                "loudness_range",
                "microdynamics_95%",
                "microdynamics_100%",
                "peak_to_loudness",
                "top1db",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    fn measure(&self, audio: &AudioBuffer) -> Option<Vec<f64>> {
        let channel_count = audio.channel_count() as u32;
        let mode = Mode::I | Mode::M | Mode::S | Mode::LRA | Mode::TRUE_PEAK;
        let mut state = match EbuR128::new(channel_count, self.sample_rate, mode) {
            Ok(state) => state,
            Err(e) => {
                warn!("EBU R128 state construction failed: {}", e);
                return None;
            }
        };

        // Feed in 100 ms steps so the momentary/short-term series can be
        // sampled after each chunk.
        let chunk_frames = (self.sample_rate as usize / 10).max(1);
        let total_frames = audio.frames();
        let mut microdynamics = Vec::new();
        let mut start = 0;
        while start < total_frames {
            let end = (start + chunk_frames).min(total_frames);
            let planes: Vec<&[f32]> = audio.channels.iter().map(|c| &c[start..end]).collect();
            if let Err(e) = state.add_frames_planar_f32(&planes) {
                warn!("EBU R128 add_frames failed: {}", e);
                return None;
            }
            if let (Ok(momentary), Ok(short_term)) =
                (state.loudness_momentary(), state.loudness_shortterm())
            {
                if momentary.is_finite() && short_term.is_finite() {
                    microdynamics.push(momentary - short_term);
                }
            }
            start = end;
        }

        let loudness_range = match state.loudness_range() {
            Ok(lra) if lra.is_finite() => lra,
            _ => 0.0,
        };

        let ldr_95 = percentile(&microdynamics, 95.0);
        let ldr_max = microdynamics
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let ldr_max = if ldr_max.is_finite() { ldr_max } else { 0.0 };

        let mut true_peak_linear = 0.0f64;
        for channel in 0..channel_count {
            if let Ok(tp) = state.true_peak(channel) {
                true_peak_linear = true_peak_linear.max(tp);
            }
        }
        let peak_to_loudness = match state.loudness_global() {
            Ok(global) if global.is_finite() && global.abs() > EPSILON && true_peak_linear > 0.0 => {
                20.0 * true_peak_linear.log10() / global
            }
            _ => 0.0,
        };

        // Ratio of samples within 1 dB of full scale, across all channels
        let top_1db_gain = 10.0f64.powf(-1.0 / 20.0);
        let mut over = 0usize;
        let mut total = 0usize;
        for channel in &audio.channels {
            total += channel.len();
            over += channel
                .iter()
                .filter(|&&s| (s.abs() as f64) > top_1db_gain)
                .count();
        }
        let top1db = if total == 0 {
            0.0
        } else {
            over as f64 / total as f64
        };

        Some(vec![
            loudness_range,
            ldr_95,
            ldr_max,
            peak_to_loudness,
            top1db,
        ])
    }
}

impl Extractor for Loudness {
    fn name(&self) -> &str {
        "loudness"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Stereo
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        self.measure(audio)
            .unwrap_or_else(|| vec![0.0; self.names.len()])
    }
}
