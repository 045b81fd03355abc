use ebur128::{EbuR128, Mode};
use log::{debug, warn};

use crate::audio::AudioBuffer;

/// Loudness-normalization collaborator. The pipeline calls this exactly once
/// per file when a target is configured, and never when normalization is
/// opted out.
pub trait LoudnessNormalizer: Send + Sync {
    /// Adjust gain in place so integrated loudness matches `target_lufs`.
    /// Must be deterministic and must leave the buffer unchanged when the
    /// loudness of the input cannot be measured (silence, too short).
    fn normalize(&self, audio: &mut AudioBuffer, target_lufs: f64);
}

/// EBU R128 based normalizer
#[derive(Debug, Default)]
pub struct EbuNormalizer;

impl LoudnessNormalizer for EbuNormalizer {
    fn normalize(&self, audio: &mut AudioBuffer, target_lufs: f64) {
        let current_lufs = match measure_integrated_lufs(audio) {
            Some(lufs) => lufs,
            None => {
                debug!("Integrated loudness not measurable, leaving gain unchanged");
                return;
            }
        };

        let gain_db = target_lufs - current_lufs;
        let linear_gain = 10.0_f64.powf(gain_db / 20.0) as f32;
        debug!(
            "Normalizing: current {:.2} LUFS, target {:.2} LUFS, gain {:.2} dB",
            current_lufs, target_lufs, gain_db
        );

        for channel in &mut audio.channels {
            for sample in channel.iter_mut() {
                *sample *= linear_gain;
            }
        }
    }
}

/// Measure integrated loudness of a whole buffer. Returns `None` for silence
/// or inputs too short for a valid EBU R128 measurement.
pub fn measure_integrated_lufs(audio: &AudioBuffer) -> Option<f64> {
    let mut state = match EbuR128::new(audio.channel_count() as u32, audio.sample_rate, Mode::I) {
        Ok(state) => state,
        Err(e) => {
            warn!("EBU R128 state construction failed: {}", e);
            return None;
        }
    };

    let planes: Vec<&[f32]> = audio.channels.iter().map(|c| c.as_slice()).collect();
    if let Err(e) = state.add_frames_planar_f32(&planes) {
        warn!("EBU R128 add_frames failed: {}", e);
        return None;
    }

    match state.loudness_global() {
        Ok(lufs) if lufs.is_finite() => Some(lufs),
        Ok(_) => None,
        Err(e) => {
            warn!("EBU R128 finalization error: {}", e);
            None
        }
    }
}
