use crate::decode::{AudioClip, AudioDecoder, DecodeError, Result};
use bytes::Bytes;
use ffmpeg_sidecar::{download, paths::ffmpeg_path};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;

/// Converts any container/codec ffmpeg understands (webm, mp3, m4a, ...)
/// into mono `f32` at a fixed rate.
#[derive(Clone, Debug)]
pub struct FfmpegAudioDecoder {
    sample_rate_hz: u32,
}

impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self {
            sample_rate_hz: crate::config::DEFAULT_ANALYSIS_SAMPLE_RATE_HZ,
        }
    }
}

impl FfmpegAudioDecoder {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self { sample_rate_hz }
    }

    fn ensure_ffmpeg_available(&self) -> Result<()> {
        download::auto_download().map_err(|e| DecodeError::FfmpegUnavailable(e.to_string()))
    }

    pub(crate) fn parse_f32le_mono(raw: &[u8]) -> Result<Vec<f32>> {
        if raw.len() % 4 != 0 {
            return Err(DecodeError::InvalidPcm(format!(
                "f32le byte length must be multiple of 4, got {}",
                raw.len()
            )));
        }
        Ok(raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    async fn run_ffmpeg(&self, input: Bytes) -> Result<Vec<f32>> {
        let rate = self.sample_rate_hz.to_string();
        let mut child = tokio::process::Command::new(ffmpeg_path())
            .args([
                "-hide_banner",
                "-nostdin",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-vn",
                "-sn",
                "-dn",
                "-ac",
                "1",
                "-ar",
                rate.as_str(),
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "pipe:1",
            ])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            DecodeError::FfmpegFailed("ffmpeg stdin unavailable (pipe not created)".to_owned())
        })?;

        // stdin must be fed concurrently with draining stdout or large inputs deadlock
        let stdin_task = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
            Ok::<(), std::io::Error>(())
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        stdin_task
            .await
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?
            .map_err(|e| DecodeError::FfmpegFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr_s = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(DecodeError::FfmpegFailed(format!(
                "exit_code={:?} stderr={stderr_s}",
                output.status.code()
            )));
        }

        Self::parse_f32le_mono(&output.stdout)
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<AudioClip>> {
        async move {
            if !path.exists() {
                return Err(DecodeError::NotFound(path.to_path_buf()));
            }
            let input = tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| DecodeError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

            self.ensure_ffmpeg_available()?;
            let samples = self.run_ffmpeg(input).await?;
            if samples.is_empty() {
                return Err(DecodeError::Empty);
            }
            tracing::debug!(
                path = %path.display(),
                samples = samples.len(),
                sample_rate_hz = self.sample_rate_hz,
                "decoded with ffmpeg"
            );
            Ok(AudioClip::new(self.sample_rate_hz, samples))
        }
        .boxed()
    }
}
