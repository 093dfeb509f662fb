//! Loading recordings into mono `f32` sample buffers.

#[cfg(feature = "ffmpeg-sidecar")]
mod ffmpeg;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "ffmpeg-sidecar")]
pub use ffmpeg::FfmpegAudioDecoder;

/// Mono PCM buffer at a known sample rate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AudioClip {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(sample_rate_hz: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate_hz,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate_hz)
    }

    /// Sample index for a time offset, rounded and clamped to the buffer.
    pub fn sample_index(&self, seconds: f64) -> usize {
        let idx = (seconds.max(0.0) * f64::from(self.sample_rate_hz)).round();
        (idx as usize).min(self.samples.len())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("audio source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported wav format: {0}")]
    UnsupportedFormat(String),

    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),

    #[error("audio source contains no samples")]
    Empty,

    #[error("decode task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

pub trait AudioDecoder: Send + Sync {
    fn decode<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioClip>>;
}

/// Reads WAV files directly; multi-channel input is averaged down to mono.
#[derive(Clone, Debug, Default)]
pub struct WavDecoder;

impl WavDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn read(path: &Path) -> Result<AudioClip> {
        if !path.exists() {
            return Err(DecodeError::NotFound(path.to_path_buf()));
        }
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        tracing::debug!(path = %path.display(), ?spec, "reading wav");

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => {
                let raw = reader
                    .samples::<i16>()
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                i16_to_f32_pcm(&raw)
            }
            (hound::SampleFormat::Int, bits @ (24 | 32)) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (format, bits) => {
                return Err(DecodeError::UnsupportedFormat(format!(
                    "{format:?} at {bits} bits"
                )))
            }
        };

        let samples = downmix_to_mono(&interleaved, spec.channels);
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(AudioClip::new(spec.sample_rate, samples))
    }
}

impl AudioDecoder for WavDecoder {
    fn decode<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioClip>> {
        let path = path.to_path_buf();
        async move {
            tokio::task::spawn_blocking(move || Self::read(&path))
                .await
                .map_err(|e| DecodeError::Join(e.to_string()))?
        }
        .boxed()
    }
}

/// Writes a clip as 32-bit float mono WAV.
pub fn write_wav(path: &Path, clip: &AudioClip) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate_hz,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &clip.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let ch = usize::from(channels);
    interleaved
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

pub fn i16_to_f32_pcm(samples: &[i16]) -> Vec<f32> {
    let scale = 1.0f32 / 32768.0f32;
    samples.iter().map(|&s| f32::from(s) * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_to_f32_basic() {
        let v = i16_to_f32_pcm(&[-32768, -1, 0, 1, 32767]);
        assert!((v[0] + 1.0).abs() < 1e-6);
        assert!((v[2] - 0.0).abs() < 1e-6);
        assert!(v[4] <= 1.0);
        assert!(v[4] > 0.9999);
    }

    #[test]
    fn stereo_is_averaged() {
        let mono = downmix_to_mono(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn sample_index_is_clamped() {
        let clip = AudioClip::new(10, vec![0.0; 20]);
        assert_eq!(clip.sample_index(0.5), 5);
        assert_eq!(clip.sample_index(-1.0), 0);
        assert_eq!(clip.sample_index(10.0), 20);
        assert!((clip.duration_secs() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn wav_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let clip = AudioClip::new(8_000, vec![0.0, 0.25, -0.5, 1.0]);
        write_wav(&path, &clip).unwrap();
        let read = WavDecoder::read(&path).unwrap();
        assert_eq!(read, clip);
    }

    #[test]
    fn missing_wav_is_not_found() {
        let err = WavDecoder::read(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[tokio::test]
    async fn decoder_trait_reads_int16_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..160 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let clip = WavDecoder::new().decode(&path).await.unwrap();
        assert_eq!(clip.sample_rate_hz, 16_000);
        assert_eq!(clip.len(), 160);
        assert!((clip.samples[0] - 0.25).abs() < 1e-6);
    }
}
