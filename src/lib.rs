//! Batch audio feature extraction: decode every audio file under an input
//! path, optionally loudness-normalize it, run a fixed registry of feature
//! extractors against it, and write one CSV row per file with a header that
//! always matches the row width.

/// Audio buffer, decoding, resampling, and file discovery
pub mod audio;
/// Module for error handling
pub mod error;
/// Feature extractor implementations and the standard registry
pub mod extractors;
/// Loudness normalization collaborator
pub mod normalize;
/// Extractor contract and the per-file orchestration
pub mod pipeline;
/// Result table accumulation and CSV serialization
pub mod table;

use std::fs;
use std::path::PathBuf;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

use crate::error::Error;
use crate::normalize::{EbuNormalizer, LoudnessNormalizer};
use crate::pipeline::Pipeline;
use crate::table::{ResultRow, ResultTable};

pub use crate::audio::{find_audio_files, load_audio, AudioBuffer, AudioFormats};
pub use crate::pipeline::{ChannelMode, Extractor, PipelineBuilder};

/// Configuration options for a feature extraction run
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Input audio file, or directory to scan recursively
    pub input: PathBuf,
    /// Destination path for the CSV output
    pub output: PathBuf,
    /// Target sample rate all audio is loaded and analyzed at
    pub sample_rate: u32,
    /// Loudness target in LUFS; `None` skips normalization entirely
    pub normalize_lufs: Option<f64>,
    /// Number of threads for parallel processing
    pub num_threads: Option<usize>,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        ExtractionOptions {
            input: PathBuf::from("."),
            output: PathBuf::from("features.csv"),
            sample_rate: 44100,
            normalize_lufs: Some(-24.0),
            num_threads: None,
        }
    }
}

/// Run the full extraction batch and write the CSV.
///
/// Files are processed in parallel but rows are emitted in input order. Any
/// per-file failure aborts the whole run with an error naming the file; a
/// row whose width differs from the header can never reach the output.
pub fn run_extraction(options: &ExtractionOptions) -> Result<(), Error> {
    if let Some(num_threads) = options.num_threads {
        if num_threads > 0 {
            let rayon_init_result = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global();
            if let Err(e) = rayon_init_result {
                warn!(
                    "Failed to configure Rayon thread pool: {}. Using default number of threads.",
                    e
                );
            } else {
                info!("Using {} threads for processing.", num_threads);
            }
        }
    }

    // 1. Validate options, including output writability, before any
    // decoding work is spent
    validate_options(options)?;

    // 2. Discover audio files. Failing before any file is processed also
    // removes the placeholder created by the writability check, so an
    // aborted run does not leave a stray empty output behind.
    info!("Discovering audio files in {:?}...", options.input);
    let files = find_audio_files(&options.input).map_err(|e| {
        let _ = fs::remove_file(&options.output);
        e
    })?;
    info!("Found {} audio files.", files.len());

    // 3. Build the pipeline; the header is fixed from here on
    let pipeline =
        Pipeline::standard(options.sample_rate, options.normalize_lufs).map_err(|e| {
            let _ = fs::remove_file(&options.output);
            e
        })?;
    let normalizer = EbuNormalizer;
    info!(
        "Extracting {} features per file at {} Hz{}",
        pipeline.feature_width(),
        options.sample_rate,
        match options.normalize_lufs {
            Some(target) => format!(", normalizing to {:.1} LUFS", target),
            None => ", normalization disabled".to_string(),
        }
    );

    // 4. Process all files in parallel, keeping input order
    let process_pb = ProgressBar::new(files.len() as u64);
    process_pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}").expect("Internal Error: Failed to set progress bar style")
        .progress_chars("#>-"));
    process_pb.set_message("Extracting features");

    let rows: Vec<ResultRow> = files
        .par_iter()
        .progress_with(process_pb.clone())
        .map(|path| pipeline.process_file(path, &normalizer as &dyn LoudnessNormalizer))
        .collect::<Result<Vec<ResultRow>, Error>>()?;
    process_pb.finish_with_message("Extraction done");

    // 5. Assemble the table and write the CSV
    let mut table = ResultTable::new(pipeline.header());
    for row in rows {
        table.push_row(row)?;
    }
    table.write_csv_to_path(&options.output)?;
    info!(
        "Wrote {} rows x {} columns to {:?}",
        table.rows().len(),
        table.header().len(),
        options.output
    );
    Ok(())
}

/// Validates extraction options for correctness
fn validate_options(options: &ExtractionOptions) -> Result<(), Error> {
    if options.sample_rate == 0 {
        return Err(Error::InvalidOptions(
            "Sample rate must be positive".to_string(),
        ));
    }
    if let Some(target) = options.normalize_lufs {
        if !target.is_finite() || target >= 0.0 {
            return Err(Error::InvalidOptions(format!(
                "LUFS target must be a negative number, got {target}"
            )));
        }
    }
    if !options.input.exists() {
        return Err(Error::InvalidOptions(format!(
            "Input path does not exist: {:?}",
            options.input
        )));
    }
    if let Some(parent) = options.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| Error::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
            info!("Created output directory: {:?}", parent);
        }
    }
    // Creating the destination now surfaces an unwritable path before any
    // file is decoded; the empty file is overwritten with the full table
    // at the end of the run.
    fs::File::create(&options.output).map_err(|e| Error::Io {
        path: options.output.clone(),
        source: e,
    })?;
    Ok(())
}
