//! Integration tests driving the standard pipeline over synthetic buffers.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use audio_feature_batch_extract::audio::AudioBuffer;
use audio_feature_batch_extract::normalize::{EbuNormalizer, LoudnessNormalizer};
use audio_feature_batch_extract::pipeline::Pipeline;
use audio_feature_batch_extract::table::ResultTable;
use audio_feature_batch_extract::{run_extraction, ExtractionOptions};

const RATE: u32 = 44100;

fn sine_at(rate: u32, hz: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
    (0..(rate as f32 * seconds) as usize)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * hz * i as f32 / rate as f32).sin())
        .collect()
}

fn sine(hz: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
    sine_at(RATE, hz, seconds, amplitude)
}

/// Write a 16-bit PCM WAV file from planar channels.
fn write_wav(path: &Path, channels: &[Vec<f32>], rate: u32) {
    let frames = channels.first().map_or(0, |c| c.len());
    let channel_count = channels.len() as u16;
    let data_len = (frames * channels.len() * 2) as u32;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channel_count.to_le_bytes());
    bytes.extend_from_slice(&rate.to_le_bytes());
    bytes.extend_from_slice(&(rate * channel_count as u32 * 2).to_le_bytes());
    bytes.extend_from_slice(&(channel_count * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        for channel in channels {
            let sample = (channel[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
    }
    fs::write(path, bytes).unwrap();
}

fn mono_buffer(seconds: f32) -> AudioBuffer {
    AudioBuffer::new(vec![sine(440.0, seconds, 0.5)], RATE)
}

fn stereo_buffer(seconds: f32) -> AudioBuffer {
    AudioBuffer::new(
        vec![sine(440.0, seconds, 0.5), sine(554.4, seconds, 0.3)],
        RATE,
    )
}

#[derive(Default)]
struct CountingNormalizer {
    calls: AtomicUsize,
}

impl LoudnessNormalizer for CountingNormalizer {
    fn normalize(&self, audio: &mut AudioBuffer, target_lufs: f64) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        EbuNormalizer.normalize(audio, target_lufs);
    }
}

#[test]
fn every_row_matches_the_header_width() {
    let pipeline = Pipeline::standard(RATE, Some(-24.0)).unwrap();
    let header = pipeline.header();

    let mut table = ResultTable::new(header.clone());
    for (name, buffer) in [
        ("mono_a.wav", mono_buffer(3.0)),
        ("mono_b.wav", mono_buffer(0.4)),
        ("stereo.wav", stereo_buffer(3.0)),
    ] {
        let row = pipeline.process_buffer(name, &buffer).unwrap();
        assert_eq!(header.len(), 1 + row.features.len());
        table.push_row(row).unwrap();
    }
    assert_eq!(table.rows().len(), 3);
}

#[test]
fn degenerate_buffers_still_produce_full_rows() {
    let pipeline = Pipeline::standard(RATE, None).unwrap();
    let width = pipeline.feature_width();

    // one sample, silence, and a clip shorter than the 1 s analysis window
    for buffer in [
        AudioBuffer::new(vec![vec![0.25]], RATE),
        AudioBuffer::new(vec![vec![0.0; RATE as usize * 2]], RATE),
        mono_buffer(0.25),
    ] {
        let row = pipeline.process_buffer("short.wav", &buffer).unwrap();
        assert_eq!(row.features.len(), width);
        assert!(row.features.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn mono_source_gets_coherent_stereo_fallback() {
    let pipeline = Pipeline::standard(RATE, None).unwrap();
    let header = pipeline.header();
    let row = pipeline.process_buffer("mono.wav", &mono_buffer(2.0)).unwrap();

    let correlation_column = header
        .iter()
        .position(|h| h == "phase_correlation")
        .unwrap();
    // feature indices are offset by the filename column
    assert!((row.features[correlation_column - 1] - 1.0).abs() < 1e-9);

    let width_column = header.iter().position(|h| h == "side_mid_ratio").unwrap();
    assert_eq!(row.features[width_column - 1], 0.0);
}

#[test]
fn windowed_headers_are_pairwise_distinct() {
    let pipeline = Pipeline::standard(RATE, None).unwrap();
    let header = pipeline.header();
    for base in ["crest_factor", "phase_correlation"] {
        assert!(header.iter().any(|h| *h == base));
        assert!(header.iter().any(|h| *h == format!("{base}_1s.mean")));
        assert!(header.iter().any(|h| *h == format!("{base}_100ms.mean")));
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let pipeline = Pipeline::standard(RATE, None).unwrap();

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let mut table = ResultTable::new(pipeline.header());
        table
            .push_row(pipeline.process_buffer("a.wav", &stereo_buffer(2.0)).unwrap())
            .unwrap();
        table
            .push_row(pipeline.process_buffer("b.wav", &mono_buffer(1.5)).unwrap())
            .unwrap();
        let mut bytes = Vec::new();
        table.write_csv(&mut bytes).unwrap();
        outputs.push(bytes);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn csv_starts_with_uncommented_header_line() {
    let pipeline = Pipeline::standard(RATE, None).unwrap();
    let mut table = ResultTable::new(pipeline.header());
    table
        .push_row(pipeline.process_buffer("x.wav", &mono_buffer(1.0)).unwrap())
        .unwrap();

    let mut bytes = Vec::new();
    table.write_csv(&mut bytes).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let first_line = text.lines().next().unwrap();
    assert!(first_line.starts_with("filename,"));
    assert_eq!(text.lines().count(), 2);
    assert_eq!(
        first_line.split(',').count(),
        text.lines().nth(1).unwrap().split(',').count()
    );
}

#[test]
fn directory_run_writes_one_ordered_row_per_file() {
    let dir = std::env::temp_dir().join(format!("feature-extract-e2e-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    write_wav(&dir.join("a.wav"), &[sine(440.0, 0.5, 0.5)], RATE);
    write_wav(&dir.join("b.wav"), &[sine(220.0, 0.5, 0.4)], RATE);
    write_wav(
        &dir.join("c.wav"),
        &[sine(440.0, 0.5, 0.5), sine(554.4, 0.5, 0.3)],
        RATE,
    );
    // decoded at 48 kHz, resampled down to the analysis rate
    write_wav(&dir.join("d.wav"), &[sine_at(48000, 330.0, 0.5, 0.4)], 48000);

    let output = dir.join("features.csv");
    let options = ExtractionOptions {
        input: dir.clone(),
        output: output.clone(),
        sample_rate: RATE,
        normalize_lufs: Some(-24.0),
        num_threads: None,
    };
    run_extraction(&options).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5, "header plus one row per file");
    assert!(lines[0].starts_with("filename,"));

    let width = lines[0].split(',').count();
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), width);
    }

    let filenames: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(filenames, vec!["a.wav", "b.wav", "c.wav", "d.wav"]);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn normalization_changes_loudness_sensitive_features() {
    let normalized = Pipeline::standard(RATE, Some(-24.0)).unwrap();
    let raw = Pipeline::standard(RATE, None).unwrap();
    let header = raw.header();

    // quiet program material
    let mut buffer_a = AudioBuffer::new(vec![sine(440.0, 4.0, 0.02)], RATE);
    let buffer_b = buffer_a.clone();

    let normalizer = EbuNormalizer;
    if let Some(target) = normalized.normalize_lufs() {
        normalizer.normalize(&mut buffer_a, target);
    }
    let row_normalized = normalized.process_buffer("a.wav", &buffer_a).unwrap();
    let row_raw = raw.process_buffer("a.wav", &buffer_b).unwrap();

    let top1db = header.iter().position(|h| h == "top1db").unwrap() - 1;
    let crest = header.iter().position(|h| h == "crest_factor").unwrap() - 1;
    // gain changes near-full-scale occupancy but not the peak-to-RMS ratio
    assert!(
        (row_normalized.features[crest] - row_raw.features[crest]).abs() < 1e-6,
        "crest factor should be gain invariant"
    );
    assert!(row_normalized.features[top1db] >= row_raw.features[top1db]);
}

#[test]
fn opted_out_pipeline_never_calls_the_normalizer() {
    let stub = CountingNormalizer::default();

    let opted_out = Pipeline::standard(RATE, None).unwrap();
    let mut buffer = mono_buffer(1.0);
    opted_out
        .normalize_and_extract("a.wav", &mut buffer, &stub)
        .unwrap();
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);

    let enabled = Pipeline::standard(RATE, Some(-24.0)).unwrap();
    let mut buffer = mono_buffer(1.0);
    enabled
        .normalize_and_extract("a.wav", &mut buffer, &stub)
        .unwrap();
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}
