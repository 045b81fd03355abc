//! Frame-based spectral descriptors: the pooled spectral shape set, the
//! frame-to-frame spectral flux, and the zero-crossing rate.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::AudioBuffer;
use crate::extractors::{distribution_stats, flatness, mean_stdev, EPSILON};
use crate::pipeline::{ChannelMode, Extractor};

pub(crate) const FRAME_SIZE: usize = 2048;
pub(crate) const HOP_SIZE: usize = 1024;

/// Hann window of `FRAME_SIZE` samples
fn hann_window() -> Vec<f32> {
    (0..FRAME_SIZE)
        .map(|n| {
            let phase = 2.0 * std::f32::consts::PI * n as f32 / (FRAME_SIZE - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Windowed magnitude spectra over all complete frames. Shorter-than-frame
/// input yields no spectra.
pub(crate) struct SpectrumFrames {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl SpectrumFrames {
    pub(crate) fn new() -> Self {
        Self {
            fft: FftPlanner::new().plan_fft_forward(FRAME_SIZE),
            window: hann_window(),
        }
    }

    /// Magnitudes of the non-negative frequency bins (`FRAME_SIZE / 2 + 1`
    /// values) for every complete hop-advanced frame.
    pub(crate) fn magnitudes(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let mut spectra = Vec::new();
        if samples.len() < FRAME_SIZE {
            return spectra;
        }
        let mut scratch = vec![Complex::new(0.0f32, 0.0f32); FRAME_SIZE];
        let mut start = 0;
        while start + FRAME_SIZE <= samples.len() {
            for (i, slot) in scratch.iter_mut().enumerate() {
                *slot = Complex::new(samples[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut scratch);
            spectra.push(
                scratch[..FRAME_SIZE / 2 + 1]
                    .iter()
                    .map(|c| c.norm() as f64)
                    .collect(),
            );
            start += HOP_SIZE;
        }
        spectra
    }
}

/// Full-signal spectral descriptor set, pooled as mean/stdev over frames.
pub struct Spectral {
    sample_rate: u32,
    names: Vec<String>,
    frames: SpectrumFrames,
}

const SPECTRAL_FEATURES: [&str; 10] = [
    "rolloff_85",
    "rolloff_95",
    "spectral_centroid",
    "spectral_spread",
    "spectral_skewness",
    "spectral_kurtosis",
    "spectral_flatness",
    "spectral_entropy",
    "harsh",
    "energy_lf",
];

impl Spectral {
    pub fn new(sample_rate: u32) -> Self {
        let names = SPECTRAL_FEATURES
            .iter()
            .flat_map(|f| [format!("{f}.mean"), format!("{f}.stdev")])
            .collect();
        Self {
            sample_rate,
            names,
            frames: SpectrumFrames::new(),
        }
    }

    fn frame_features(&self, magnitudes: &[f64]) -> [f64; 10] {
        let nyquist = self.sample_rate as f64 / 2.0;
        let bin_hz = nyquist / (magnitudes.len() - 1) as f64;

        let energies: Vec<f64> = magnitudes.iter().map(|m| m * m).collect();
        let total_energy: f64 = energies.iter().sum();
        let total_magnitude: f64 = magnitudes.iter().sum();

        let rolloff_85 = rolloff(&energies, total_energy, bin_hz, 0.85);
        let rolloff_95 = rolloff(&energies, total_energy, bin_hz, 0.95);

        let (centroid, spread, skewness, kurtosis) = distribution_stats(magnitudes, nyquist);
        let spectral_flatness = flatness(magnitudes);

        let entropy = if total_magnitude < EPSILON {
            0.0
        } else {
            -magnitudes
                .iter()
                .filter(|&&m| m > 0.0)
                .map(|&m| {
                    let p = m / total_magnitude;
                    p * p.log2()
                })
                .sum::<f64>()
        };

        let harsh = band_energy_ratio(&energies, total_energy, bin_hz, 2000.0, 5000.0);
        let energy_lf = band_energy_ratio(&energies, total_energy, bin_hz, 20.0, 80.0);

        [
            rolloff_85,
            rolloff_95,
            centroid,
            spread,
            skewness,
            kurtosis,
            spectral_flatness,
            entropy,
            harsh,
            energy_lf,
        ]
    }
}

/// Frequency below which `cutoff` of the spectral energy lies
fn rolloff(energies: &[f64], total_energy: f64, bin_hz: f64, cutoff: f64) -> f64 {
    if total_energy < EPSILON {
        return 0.0;
    }
    let threshold = cutoff * total_energy;
    let mut cumulative = 0.0;
    for (i, e) in energies.iter().enumerate() {
        cumulative += e;
        if cumulative >= threshold {
            return i as f64 * bin_hz;
        }
    }
    (energies.len() - 1) as f64 * bin_hz
}

/// Energy inside `[low_hz, high_hz]` relative to total spectral energy
fn band_energy_ratio(
    energies: &[f64],
    total_energy: f64,
    bin_hz: f64,
    low_hz: f64,
    high_hz: f64,
) -> f64 {
    if total_energy < EPSILON {
        return 0.0;
    }
    let band: f64 = energies
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let hz = *i as f64 * bin_hz;
            hz >= low_hz && hz <= high_hz
        })
        .map(|(_, e)| e)
        .sum();
    band / total_energy
}

impl Extractor for Spectral {
    fn name(&self) -> &str {
        "spectral"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Mono
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let samples = audio.channels.first().map_or(&[][..], |c| c.as_slice());
        let spectra = self.frames.magnitudes(samples);
        let mut per_feature: Vec<Vec<f64>> = vec![Vec::with_capacity(spectra.len()); 10];
        for spectrum in &spectra {
            for (slot, value) in per_feature.iter_mut().zip(self.frame_features(spectrum)) {
                slot.push(value);
            }
        }

        let mut result = Vec::with_capacity(self.names.len());
        for values in &per_feature {
            let (mean, stdev) = mean_stdev(values);
            result.push(mean);
            result.push(stdev);
        }
        result
    }
}

/// Frame-to-frame spectral change: L2 norm of the half-wave-rectified
/// magnitude difference between consecutive frames, pooled as mean/stdev.
pub struct SpectralFlux {
    names: Vec<String>,
    frames: SpectrumFrames,
}

impl SpectralFlux {
    pub fn new() -> Self {
        Self {
            names: super::pooled_names("spectral_flux"),
            frames: SpectrumFrames::new(),
        }
    }
}

impl Default for SpectralFlux {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for SpectralFlux {
    fn name(&self) -> &str {
        "spectral_flux"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Mono
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let samples = audio.channels.first().map_or(&[][..], |c| c.as_slice());
        let spectra = self.frames.magnitudes(samples);
        let flux: Vec<f64> = spectra
            .windows(2)
            .map(|pair| {
                pair[1]
                    .iter()
                    .zip(&pair[0])
                    .map(|(current, previous)| (current - previous).max(0.0).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();
        let (mean, stdev) = mean_stdev(&flux);
        vec![mean, stdev]
    }
}

/// Fraction of adjacent sample pairs whose signs differ
pub struct ZeroCrossingRate {
    names: Vec<String>,
}

impl ZeroCrossingRate {
    pub fn new() -> Self {
        Self {
            names: vec!["zero_crossing_rate".to_string()],
        }
    }
}

impl Default for ZeroCrossingRate {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for ZeroCrossingRate {
    fn name(&self) -> &str {
        "zero_crossing_rate"
    }

    fn channel_mode(&self) -> ChannelMode {
        ChannelMode::Mono
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        let samples = audio.channels.first().map_or(&[][..], |c| c.as_slice());
        if samples.len() < 2 {
            return vec![0.0];
        }
        let crossings = samples
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        vec![crossings as f64 / (samples.len() - 1) as f64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(samples: Vec<f32>, rate: u32) -> AudioBuffer {
        AudioBuffer::new(vec![samples], rate)
    }

    fn sine(rate: u32, hz: f32, seconds: f32) -> Vec<f32> {
        let n = (rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn spectral_output_matches_header_arity() {
        let extractor = Spectral::new(44100);
        for buffer in [
            mono(vec![0.0], 44100),
            mono(vec![0.0; 44100], 44100),
            mono(sine(44100, 440.0, 1.0), 44100),
            mono(sine(44100, 440.0, 0.01), 44100),
        ] {
            assert_eq!(
                extractor.compute(&buffer).len(),
                extractor.header_names().len()
            );
        }
    }

    #[test]
    fn centroid_tracks_tone_frequency() {
        let extractor = Spectral::new(44100);
        let low = extractor.compute(&mono(sine(44100, 220.0, 1.0), 44100));
        let high = extractor.compute(&mono(sine(44100, 4000.0, 1.0), 44100));
        // spectral_centroid.mean is the fifth value
        assert!(high[4] > low[4]);
    }

    #[test]
    fn silence_yields_zero_spectral_features() {
        let extractor = Spectral::new(44100);
        let values = extractor.compute(&mono(vec![0.0; 44100], 44100));
        assert!(values.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn flux_is_higher_for_changing_signal() {
        let extractor = SpectralFlux::new();
        let steady = extractor.compute(&mono(sine(44100, 440.0, 1.0), 44100));

        let mut alternating = sine(44100, 440.0, 0.5);
        alternating.extend(sine(44100, 3000.0, 0.5));
        let changing = extractor.compute(&mono(alternating, 44100));
        assert!(changing[1] > steady[1], "stdev should rise on a switch");
        assert_eq!(steady.len(), extractor.header_names().len());
    }

    #[test]
    fn flux_degrades_to_zero_for_short_input() {
        let extractor = SpectralFlux::new();
        assert_eq!(extractor.compute(&mono(vec![0.5; 10], 44100)), vec![0.0, 0.0]);
    }

    #[test]
    fn zcr_of_alternating_signal_is_one() {
        let extractor = ZeroCrossingRate::new();
        let alternating: Vec<f32> = (0..100)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert_eq!(extractor.compute(&mono(alternating, 44100)), vec![1.0]);
        assert_eq!(extractor.compute(&mono(vec![0.7], 44100)), vec![0.0]);
    }
}
