use std::path::Path;

use log::debug;

use crate::audio::{self, AudioBuffer};
use crate::error::Error;
use crate::normalize::LoudnessNormalizer;
use crate::table::ResultRow;

/// Which buffer an extractor is fed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Receives the mono downmix
    Mono,
    /// Receives the original buffer, promoted to dual-mono when the source
    /// has a single channel. Always sees at least two channels.
    Stereo,
}

/// A stateless feature-computing unit.
///
/// `compute` must return the same number of values as `header_names` for
/// every input, including silent, one-sample, and shorter-than-window
/// buffers. Degenerate inputs map to deterministic sentinel values instead
/// of errors; the pipeline rejects any instance that breaks this contract.
pub trait Extractor: Send + Sync {
    /// Short identifier used in error messages
    fn name(&self) -> &str;
    fn channel_mode(&self) -> ChannelMode;
    fn header_names(&self) -> &[String];
    fn compute(&self, audio: &AudioBuffer) -> Vec<f64>;
}

/// Wrapper applying a validated header-name override to an extractor
/// instance, used to disambiguate multiple instances of the same algorithm
/// at different window lengths.
struct Renamed {
    inner: Box<dyn Extractor>,
    names: Vec<String>,
}

impl Extractor for Renamed {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn channel_mode(&self) -> ChannelMode {
        self.inner.channel_mode()
    }

    fn header_names(&self) -> &[String] {
        &self.names
    }

    fn compute(&self, audio: &AudioBuffer) -> Vec<f64> {
        self.inner.compute(audio)
    }
}

/// Builds a [`Pipeline`] from an ordered extractor registry. Header-name
/// overrides are applied and validated here, before the file loop can begin.
pub struct PipelineBuilder {
    sample_rate: u32,
    normalize_lufs: Option<f64>,
    extractors: Vec<Box<dyn Extractor>>,
}

impl PipelineBuilder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            normalize_lufs: None,
            extractors: Vec::new(),
        }
    }

    /// Set the loudness target in LUFS, or `None` to skip normalization.
    pub fn normalize(&mut self, target_lufs: Option<f64>) -> &mut Self {
        self.normalize_lufs = target_lufs;
        self
    }

    pub fn register(&mut self, extractor: impl Extractor + 'static) -> &mut Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Register an extractor under replacement header names. Fails when the
    /// override arity does not match the extractor's declared output width.
    pub fn register_renamed(
        &mut self,
        extractor: impl Extractor + 'static,
        names: Vec<String>,
    ) -> Result<&mut Self, Error> {
        let expected = extractor.header_names().len();
        if names.len() != expected {
            return Err(Error::HeaderOverride {
                extractor: extractor.name().to_string(),
                expected,
                got: names.len(),
            });
        }
        self.extractors.push(Box::new(Renamed {
            inner: Box::new(extractor),
            names,
        }));
        Ok(self)
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            sample_rate: self.sample_rate,
            normalize_lufs: self.normalize_lufs,
            extractors: self.extractors,
        }
    }
}

/// Ordered extractor registry plus the run-scoped analysis parameters.
/// Extractor instances carry no per-file state, so one pipeline is shared
/// read-only across rayon workers.
pub struct Pipeline {
    sample_rate: u32,
    normalize_lufs: Option<f64>,
    extractors: Vec<Box<dyn Extractor>>,
}

impl Pipeline {
    /// The standard extractor registry at the given analysis rate.
    pub fn standard(sample_rate: u32, normalize_lufs: Option<f64>) -> Result<Pipeline, Error> {
        let mut builder = PipelineBuilder::new(sample_rate);
        builder.normalize(normalize_lufs);
        crate::extractors::register_standard(&mut builder, sample_rate)?;
        Ok(builder.build())
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn normalize_lufs(&self) -> Option<f64> {
        self.normalize_lufs
    }

    /// Total number of feature columns, excluding the filename column.
    pub fn feature_width(&self) -> usize {
        self.extractors.iter().map(|e| e.header_names().len()).sum()
    }

    /// `["filename"]` followed by every extractor's header names in
    /// registration order.
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(1 + self.feature_width());
        header.push("filename".to_string());
        for extractor in &self.extractors {
            header.extend_from_slice(extractor.header_names());
        }
        header
    }

    /// Load, normalize, and extract features from one file.
    pub fn process_file(
        &self,
        path: &Path,
        normalizer: &dyn LoudnessNormalizer,
    ) -> Result<ResultRow, Error> {
        let mut buffer = audio::load_audio(path, self.sample_rate).map_err(|source| {
            Error::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let filename = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned();
        self.normalize_and_extract(&filename, &mut buffer, normalizer)
    }

    /// Apply the configured normalization, if any, then extract. The
    /// normalizer is consulted only when a target is set.
    pub fn normalize_and_extract(
        &self,
        filename: &str,
        buffer: &mut AudioBuffer,
        normalizer: &dyn LoudnessNormalizer,
    ) -> Result<ResultRow, Error> {
        if let Some(target) = self.normalize_lufs {
            normalizer.normalize(buffer, target);
        }
        self.process_buffer(filename, buffer)
    }

    /// Run every registered extractor against an already-loaded buffer and
    /// assemble the row. Mono-mode extractors receive the downmix; stereo
    /// extractors receive the original layout, promoted to dual-mono for
    /// single-channel sources.
    pub fn process_buffer(&self, filename: &str, buffer: &AudioBuffer) -> Result<ResultRow, Error> {
        let mono = buffer.downmix_mono();
        let stereo = buffer.to_stereo();

        let mut features = Vec::with_capacity(self.feature_width());
        for extractor in &self.extractors {
            let input = match extractor.channel_mode() {
                ChannelMode::Mono => &mono,
                ChannelMode::Stereo => &stereo,
            };
            let values = extractor.compute(input);
            if values.len() != extractor.header_names().len() {
                return Err(Error::FeatureShape {
                    path: filename.into(),
                    extractor: extractor.name().to_string(),
                    expected: extractor.header_names().len(),
                    got: values.len(),
                });
            }
            features.extend(values);
        }

        debug!("Extracted {} features from {}", features.len(), filename);
        Ok(ResultRow {
            filename: filename.to_string(),
            features,
        })
    }
}
