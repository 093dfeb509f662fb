//! Fundamental-frequency statistics over voiced frames.

use crate::decode::AudioClip;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_HOP_SECS: f64 = 0.010;
const DEFAULT_WINDOW_SECS: f64 = 0.040;
const DEFAULT_MIN_HZ: f64 = 75.0;
const DEFAULT_MAX_HZ: f64 = 600.0;
const DEFAULT_VOICING_THRESHOLD: f64 = 0.5;
const SILENCE_RMS: f64 = 1e-4;

/// Smallest F0 step between voiced frames that counts as a rise or fall.
pub const INTONATION_STEP_HZ: f64 = 2.0;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PitchRegister {
    #[default]
    Undefined,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl PitchRegister {
    pub fn classify(mean_hz: f64) -> Self {
        if !mean_hz.is_finite() || mean_hz <= 0.0 {
            Self::Undefined
        } else if mean_hz < 100.0 {
            Self::VeryLow
        } else if mean_hz < 150.0 {
            Self::Low
        } else if mean_hz < 250.0 {
            Self::Medium
        } else if mean_hz < 300.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::VeryLow => "very low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very high",
        }
    }
}

impl fmt::Display for PitchRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts of frame-to-frame pitch movements larger than
/// [`INTONATION_STEP_HZ`] between consecutive voiced frames.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Intonation {
    pub rising: usize,
    pub falling: usize,
}

impl Intonation {
    pub fn from_voiced(voiced: &[f64]) -> Self {
        voiced
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(Self::default(), |mut acc, step| {
                if step > INTONATION_STEP_HZ {
                    acc.rising += 1;
                } else if step < -INTONATION_STEP_HZ {
                    acc.falling += 1;
                }
                acc
            })
    }
}

/// Summary of voiced-frame F0 in Hz. All zero with an undefined register
/// when nothing was voiced.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PitchStats {
    pub median: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub register: PitchRegister,
    pub intonation: Intonation,
}

impl PitchStats {
    /// `f0` is a track in frame order; unvoiced entries (zero, negative or
    /// non-finite) are skipped, so intonation steps bridge unvoiced gaps.
    pub fn from_f0(f0: &[f64]) -> Self {
        let voiced: Vec<f64> = f0
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect();
        if voiced.is_empty() {
            return Self::default();
        }
        let intonation = Intonation::from_voiced(&voiced);

        let mut sorted = voiced;
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let variance = sorted.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;

        Self {
            median,
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[n - 1],
            register: PitchRegister::classify(mean),
            intonation,
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.register != PitchRegister::Undefined
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PitchError {
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,

    #[error("search range {min_hz}..{max_hz} Hz does not fit sample rate {sample_rate_hz} Hz")]
    InvalidRange {
        min_hz: f64,
        max_hz: f64,
        sample_rate_hz: u32,
    },

    #[error("pitch worker failed: {0}")]
    Join(String),
}

pub trait PitchEstimator: Send + Sync {
    fn estimate<'a>(&'a self, clip: &'a AudioClip)
        -> BoxFuture<'a, Result<PitchStats, PitchError>>;
}

/// Normalised autocorrelation tracker. A frame is voiced when its best
/// correlation peak in the search range clears the voicing threshold.
#[derive(Clone, Debug)]
pub struct AutocorrelationPitchEstimator {
    pub hop_secs: f64,
    pub window_secs: f64,
    pub min_hz: f64,
    pub max_hz: f64,
    pub voicing_threshold: f64,
}

impl Default for AutocorrelationPitchEstimator {
    fn default() -> Self {
        Self {
            hop_secs: DEFAULT_HOP_SECS,
            window_secs: DEFAULT_WINDOW_SECS,
            min_hz: DEFAULT_MIN_HZ,
            max_hz: DEFAULT_MAX_HZ,
            voicing_threshold: DEFAULT_VOICING_THRESHOLD,
        }
    }
}

impl AutocorrelationPitchEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-frame F0 in Hz, `None` for unvoiced frames.
    pub fn track(&self, clip: &AudioClip) -> Result<Vec<Option<f64>>, PitchError> {
        if clip.sample_rate_hz == 0 {
            return Err(PitchError::ZeroSampleRate);
        }
        let sr = f64::from(clip.sample_rate_hz);
        let min_lag = (sr / self.max_hz).floor() as usize;
        let max_lag = (sr / self.min_hz).ceil() as usize;
        let window = ((sr * self.window_secs).round() as usize).max(max_lag + 1);
        if min_lag < 1 || min_lag >= max_lag {
            return Err(PitchError::InvalidRange {
                min_hz: self.min_hz,
                max_hz: self.max_hz,
                sample_rate_hz: clip.sample_rate_hz,
            });
        }
        let hop = ((sr * self.hop_secs).round() as usize).max(1);
        if clip.len() < window {
            return Ok(Vec::new());
        }

        let frames = (0..=clip.len() - window)
            .step_by(hop)
            .map(|start| {
                let frame = &clip.samples[start..start + window];
                self.frame_f0(frame, min_lag, max_lag, sr)
            })
            .collect();
        Ok(frames)
    }

    fn frame_f0(&self, frame: &[f32], min_lag: usize, max_lag: usize, sr: f64) -> Option<f64> {
        let mean = frame.iter().map(|&s| f64::from(s)).sum::<f64>() / frame.len() as f64;
        let x: Vec<f64> = frame.iter().map(|&s| f64::from(s) - mean).collect();
        let energy = x.iter().map(|v| v * v).sum::<f64>();
        if (energy / x.len() as f64).sqrt() < SILENCE_RMS {
            return None;
        }

        let corr: Vec<f64> = (min_lag..=max_lag)
            .map(|lag| normalised_autocorrelation(&x, lag))
            .collect();
        let best = corr.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if best < self.voicing_threshold {
            return None;
        }

        // earliest local peak close to the global one avoids octave-down errors
        let peak = (0..corr.len()).find(|&i| {
            let left = if i == 0 { f64::NEG_INFINITY } else { corr[i - 1] };
            let right = corr.get(i + 1).copied().unwrap_or(f64::NEG_INFINITY);
            corr[i] >= 0.9 * best && corr[i] >= left && corr[i] >= right
        })?;

        let offset = if peak > 0 && peak + 1 < corr.len() {
            let (a, b, c) = (corr[peak - 1], corr[peak], corr[peak + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > f64::EPSILON {
                (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        } else {
            0.0
        };
        let lag = (min_lag + peak) as f64 + offset;
        Some(sr / lag)
    }

    pub fn stats(&self, clip: &AudioClip) -> Result<PitchStats, PitchError> {
        let track = self.track(clip)?;
        let voiced: Vec<f64> = track.iter().flatten().copied().collect();
        tracing::debug!(frames = track.len(), voiced = voiced.len(), "pitch tracked");
        Ok(PitchStats::from_f0(&voiced))
    }
}

fn normalised_autocorrelation(x: &[f64], lag: usize) -> f64 {
    let n = x.len() - lag;
    let (mut cross, mut e0, mut e1) = (0.0, 0.0, 0.0);
    for i in 0..n {
        cross += x[i] * x[i + lag];
        e0 += x[i] * x[i];
        e1 += x[i + lag] * x[i + lag];
    }
    let denom = (e0 * e1).sqrt();
    if denom <= 0.0 {
        0.0
    } else {
        cross / denom
    }
}

impl PitchEstimator for AutocorrelationPitchEstimator {
    fn estimate<'a>(
        &'a self,
        clip: &'a AudioClip,
    ) -> BoxFuture<'a, Result<PitchStats, PitchError>> {
        let this = self.clone();
        let clip = clip.clone();
        async move {
            tokio::task::spawn_blocking(move || this.stats(&clip))
                .await
                .map_err(|e| PitchError::Join(e.to_string()))?
        }
        .boxed()
    }
}
