//! Tone classification seam: a label plus a distribution over emotion classes.

mod command;
mod prosody;

use crate::decode::AudioClip;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

pub use command::CommandEmotionClassifier;
pub use prosody::ProsodyEmotionClassifier;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output as serialised under `tone_score`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToneScore {
    pub label: String,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

impl ToneScore {
    /// Highest-scoring class wins; ties go to the first key in order.
    pub fn from_scores(scores: BTreeMap<String, f64>) -> Option<Self> {
        let label = scores
            .iter()
            .fold(None::<(&String, f64)>, |best, (k, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((k, v)),
            })?
            .0
            .clone();
        Some(Self { label, scores })
    }
}

/// Coarse prosody of the trimmed clip.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProsodyFeatures {
    pub energy_rms: f32,
    pub pitch_hz: Option<f32>,
    pub speaking_rate_wpm: Option<f32>,
}

impl ProsodyFeatures {
    pub fn from_clip(
        clip: &AudioClip,
        pitch_hz: Option<f32>,
        speaking_rate_wpm: Option<f32>,
    ) -> Self {
        let energy_rms = if clip.is_empty() {
            0.0
        } else {
            let sum_sq: f64 = clip.samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
            (sum_sq / clip.len() as f64).sqrt() as f32
        };
        Self {
            energy_rms,
            pitch_hz,
            speaking_rate_wpm,
        }
    }
}

/// Everything a classifier may look at for one analysis.
#[derive(Clone, Debug)]
pub struct EmotionInput {
    pub artifact_path: PathBuf,
    pub prosody: ProsodyFeatures,
    pub transcript: String,
}

#[derive(thiserror::Error, Debug)]
pub enum EmotionError {
    #[error("failed to spawn classifier {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("classifier output is not valid tone json: {0}")]
    InvalidOutput(String),

    #[error("emotion analysis failed")]
    AnalysisFailed,
}

pub trait EmotionClassifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        input: &'a EmotionInput,
    ) -> BoxFuture<'a, Result<ToneScore, EmotionError>>;
}
