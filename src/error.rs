use std::path::PathBuf;

use symphonia::core::errors::Error as SymphoniaError;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Symphonia error: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No compatible audio track found")]
    NoTrack,
    #[error("Sample rate missing from codec parameters")]
    MissingSampleRate,
    #[error("Unsupported sample format")]
    UnsupportedFormat,
    #[error("Stream decoded to zero samples")]
    EmptyAudio,
    #[error("Resampler construction failed: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),
    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("No audio files found under {0:?}")]
    NoAudioFiles(PathBuf),
    #[error("Decoding failed for {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error(
        "Extractor {extractor} produced {got} values for {path:?} but declares {expected} headers"
    )]
    FeatureShape {
        path: PathBuf,
        extractor: String,
        expected: usize,
        got: usize,
    },
    #[error("Header override for {extractor} has {got} names, extractor declares {expected}")]
    HeaderOverride {
        extractor: String,
        expected: usize,
        got: usize,
    },
    #[error("Row for {filename} has {got} columns, header has {expected}")]
    RowWidth {
        filename: String,
        expected: usize,
        got: usize,
    },
    #[error("CSV writing failed for {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("I/O error during processing of {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
