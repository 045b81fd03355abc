use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use strum_macros::Display;
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use walkdir::WalkDir;

use crate::error::{DecodeError, Error};

/// Represents supported audio file formats
#[derive(Debug, PartialEq, Display)]
#[strum(serialize_all = "camelCase")]
pub enum AudioFormats {
    Wav,
    Mp3,
    Flac,
    Ogg,
    M4a,
    Aac,
    Opus,
}

impl AudioFormats {
    /// Returns a list of supported file extensions
    #[inline]
    pub fn supported_extensions() -> &'static [&'static str] {
        &["wav", "mp3", "flac", "ogg", "m4a", "aac", "opus"]
    }

    /// Creates an AudioFormats enum from a file path based on its extension
    #[inline]
    pub fn from_path(value: impl AsRef<Path>) -> Option<Self> {
        Some(
            match value
                .as_ref()
                .extension()
                .unwrap_or_default()
                .to_string_lossy()
                .to_lowercase()
                .as_ref()
            {
                "wav" => Self::Wav,
                "mp3" => Self::Mp3,
                "flac" => Self::Flac,
                "ogg" => Self::Ogg,
                "m4a" => Self::M4a,
                "aac" => Self::Aac,
                "opus" => Self::Opus,
                _ => return None,
            },
        )
    }
}

/// In-memory decoded audio: planar samples plus the rate they were loaded at.
///
/// Invariant: every channel vector has the same length.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Per-channel sample planes, normalized to [-1.0, 1.0]
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(
            channels
                .windows(2)
                .all(|pair| pair[0].len() == pair[1].len()),
            "channel planes must have equal length"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames per channel
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// Average all channels into a single mono plane at the same rate.
    pub fn downmix_mono(&self) -> AudioBuffer {
        let frames = self.frames();
        let channel_count = self.channel_count();
        if channel_count <= 1 {
            return self.clone();
        }
        let scale = 1.0 / channel_count as f32;
        let mut mono = Vec::with_capacity(frames);
        for i in 0..frames {
            let mut acc = 0.0f32;
            for channel in &self.channels {
                acc += channel[i];
            }
            mono.push(acc * scale);
        }
        AudioBuffer::new(vec![mono], self.sample_rate)
    }

    /// Return a buffer with at least two channels, duplicating a mono plane
    /// into dual-mono. Stereo-relationship extractors are only ever fed the
    /// result of this call, so they can rely on two channels being present.
    pub fn to_stereo(&self) -> AudioBuffer {
        if self.channel_count() >= 2 {
            return self.clone();
        }
        let plane = self.channels.first().cloned().unwrap_or_default();
        AudioBuffer::new(vec![plane.clone(), plane], self.sample_rate)
    }
}

/// Decode an audio file fully into memory at `target_rate`, preserving the
/// original channel layout. Resamples with rubato when the native rate differs.
pub fn load_audio(path: impl AsRef<Path>, target_rate: u32) -> Result<AudioBuffer, DecodeError> {
    let path = path.as_ref();
    let file = fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(ext.to_str().unwrap_or(""));
    }
    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;

    let native_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::MissingSampleRate)?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;

    let mut planes: Vec<Vec<f32>> = Vec::new();

    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }
                match decoder.decode(&packet) {
                    Ok(decoded) => {
                        let chunk = convert_buffer_to_planar_f32(&decoded)?;
                        if planes.is_empty() {
                            planes = chunk;
                        } else {
                            for (plane, mut incoming) in planes.iter_mut().zip(chunk) {
                                plane.append(&mut incoming);
                            }
                        }
                    }
                    Err(SymphoniaError::DecodeError(e)) => {
                        warn!(
                            "Decode error in {:?}: {}. Skipping packet.",
                            path.file_name().unwrap_or_default(),
                            e
                        );
                    }
                    Err(SymphoniaError::IoError(ref e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        break;
                    }
                    Err(e) => return Err(DecodeError::Symphonia(e)),
                }
            }
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(DecodeError::Symphonia(e)),
        }
    }

    if planes.is_empty() || planes[0].is_empty() {
        return Err(DecodeError::EmptyAudio);
    }

    debug!(
        "Decoded {:?}: {} channels, {} frames at {} Hz",
        path.file_name().unwrap_or_default(),
        planes.len(),
        planes[0].len(),
        native_rate
    );

    let planes = if native_rate != target_rate {
        debug!(
            "Resampling {:?} from {} Hz to {} Hz",
            path.file_name().unwrap_or_default(),
            native_rate,
            target_rate
        );
        resample_planar(planes, native_rate, target_rate)?
    } else {
        planes
    };

    Ok(AudioBuffer::new(planes, target_rate))
}

/// Resample planar audio to `target_rate` with a single-pass sinc resampler.
fn resample_planar(
    planes: Vec<Vec<f32>>,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, DecodeError> {
    let num_frames = planes[0].len();
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;

    // Chunk size equal to input length allows single-pass processing
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 2.0, params, num_frames, planes.len())?;

    Ok(resampler.process(&planes, None)?)
}

/// Converts any Symphonia audio buffer to planar f32 format
fn convert_buffer_to_planar_f32(
    decoded: &AudioBufferRef<'_>,
) -> Result<Vec<Vec<f32>>, DecodeError> {
    let num_channels = decoded.spec().channels.count();
    let mut planar_output: Vec<Vec<f32>> = Vec::with_capacity(num_channels);

    match decoded {
        AudioBufferRef::F32(buf) => {
            for plane in buf.planes().planes() {
                planar_output.push(plane.to_vec());
            }
        }
        AudioBufferRef::F64(buf) => {
            for plane in buf.planes().planes() {
                planar_output.push(plane.iter().map(|&s| s as f32).collect());
            }
        }
        AudioBufferRef::S32(buf) => {
            for plane in buf.planes().planes() {
                planar_output.push(
                    plane
                        .iter()
                        .map(|&s| (s as f32) / (i32::MAX as f32))
                        .collect(),
                );
            }
        }
        AudioBufferRef::S24(buf) => {
            for plane in buf.planes().planes() {
                // i24 range is -2^23 to 2^23 - 1
                let max_value = 8388607.0;
                planar_output.push(
                    plane
                        .iter()
                        .map(|&s| s.inner() as f32 / max_value)
                        .collect(),
                );
            }
        }
        AudioBufferRef::S16(buf) => {
            for plane in buf.planes().planes() {
                planar_output.push(
                    plane
                        .iter()
                        .map(|&s| (s as f32) / (i16::MAX as f32))
                        .collect(),
                );
            }
        }
        AudioBufferRef::U8(buf) => {
            for plane in buf.planes().planes() {
                planar_output.push(
                    plane
                        .iter()
                        .map(|&s| ((s as i16 - 128) as f32) / 128.0)
                        .collect(),
                );
            }
        }
        _ => return Err(DecodeError::UnsupportedFormat),
    }
    Ok(planar_output)
}

/// Finds all supported audio files under the input path. A single-file input
/// is accepted directly when its extension is supported; a directory is
/// walked recursively. Paths are returned sorted so row order is stable.
pub fn find_audio_files(input: impl AsRef<Path>) -> Result<Vec<PathBuf>, Error> {
    let input = input.as_ref();

    if input.is_file() {
        return if AudioFormats::from_path(input).is_some() {
            Ok(vec![input.to_path_buf()])
        } else {
            Err(Error::NoAudioFiles(input.to_path_buf()))
        };
    }

    let mut audio_files = Vec::new();
    for entry in WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if AudioFormats::from_path(path).is_some() {
            audio_files.push(path.to_path_buf());
        }
    }

    if audio_files.is_empty() {
        return Err(Error::NoAudioFiles(input.to_path_buf()));
    }
    Ok(audio_files)
}
