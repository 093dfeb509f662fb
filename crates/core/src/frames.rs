//! Fixed-rate frame series and the loudness contour extractor that fills them.

use crate::decode::AudioClip;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

const DB_FLOOR: f64 = -100.0;
const WINDOW_SECS: f64 = 0.025;

/// Scalar values sampled at a constant frame rate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameSeries {
    frame_rate_hz: f64,
    values: Vec<f64>,
}

impl FrameSeries {
    pub fn new(frame_rate_hz: f64, values: Vec<f64>) -> Result<Self, FrameError> {
        if frame_rate_hz.is_nan() || frame_rate_hz <= 0.0 {
            return Err(FrameError::InvalidFrameRate(frame_rate_hz));
        }
        Ok(Self {
            frame_rate_hz,
            values,
        })
    }

    pub fn frame_rate_hz(&self) -> f64 {
        self.frame_rate_hz
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frames_to_secs(&self, frames: usize) -> f64 {
        frames as f64 / self.frame_rate_hz
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames_to_secs(self.values.len())
    }

    /// Level statistics over every frame; `None` for an empty series.
    pub fn intensity(&self) -> Option<IntensityStats> {
        let values = &self.values;
        if values.is_empty() {
            return None;
        }
        let (mean, std) = mean_std(values);
        let steps: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        Some(IntensityStats {
            mean,
            std,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            variability: if steps.is_empty() { 0.0 } else { mean_std(&steps).1 },
        })
    }
}

/// Loudness contour summary in dB. `variability` is the standard deviation
/// of frame-to-frame level changes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub variability: f64,
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame rate must be > 0 Hz, got {0}")]
    InvalidFrameRate(f64),
    #[error("frame rate {frame_rate_hz} Hz exceeds sample rate {sample_rate_hz} Hz")]
    FrameRateAboveSampleRate {
        frame_rate_hz: f64,
        sample_rate_hz: u32,
    },
    #[error("frame worker failed: {0}")]
    Join(String),
}

/// Acoustic descriptor collaborator producing a loudness contour.
pub trait FrameExtractor: Send + Sync {
    fn loudness<'a>(&'a self, clip: &'a AudioClip)
        -> BoxFuture<'a, Result<FrameSeries, FrameError>>;
}

/// Short-time RMS level in dBFS over a 25 ms window, one frame per hop.
#[derive(Clone, Debug)]
pub struct RmsFrameExtractor {
    frame_rate_hz: f64,
}

impl Default for RmsFrameExtractor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FRAME_RATE_HZ)
    }
}

impl RmsFrameExtractor {
    pub fn new(frame_rate_hz: f64) -> Self {
        Self { frame_rate_hz }
    }

    /// The series carries the rate actually produced by the integer hop,
    /// which differs from the requested rate when it does not divide the
    /// sample rate.
    pub fn extract(&self, clip: &AudioClip) -> Result<FrameSeries, FrameError> {
        if self.frame_rate_hz.is_nan() || self.frame_rate_hz <= 0.0 {
            return Err(FrameError::InvalidFrameRate(self.frame_rate_hz));
        }
        let sr = f64::from(clip.sample_rate_hz);
        if self.frame_rate_hz > sr {
            return Err(FrameError::FrameRateAboveSampleRate {
                frame_rate_hz: self.frame_rate_hz,
                sample_rate_hz: clip.sample_rate_hz,
            });
        }
        let hop = ((sr / self.frame_rate_hz).round() as usize).max(1);
        let window = ((sr * WINDOW_SECS).round() as usize).max(hop);

        let values = (0..clip.len())
            .step_by(hop)
            .map(|start| {
                let end = (start + window).min(clip.len());
                rms_db(&clip.samples[start..end])
            })
            .collect();
        FrameSeries::new(sr / hop as f64, values)
    }
}

impl FrameExtractor for RmsFrameExtractor {
    fn loudness<'a>(
        &'a self,
        clip: &'a AudioClip,
    ) -> BoxFuture<'a, Result<FrameSeries, FrameError>> {
        let this = self.clone();
        let clip = clip.clone();
        async move {
            tokio::task::spawn_blocking(move || this.extract(&clip))
                .await
                .map_err(|e| FrameError::Join(e.to_string()))?
        }
        .boxed()
    }
}

pub fn rms_db(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return DB_FLOOR;
    }
    let ms = samples
        .iter()
        .map(|&s| f64::from(s) * f64::from(s))
        .sum::<f64>()
        / samples.len() as f64;
    if ms <= 0.0 {
        return DB_FLOOR;
    }
    (10.0 * ms.log10()).max(DB_FLOOR)
}
