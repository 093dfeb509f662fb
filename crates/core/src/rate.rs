use crate::asr::WordToken;
use serde::{Deserialize, Serialize};
use std::fmt;

const SLOW_BELOW_WPM: f64 = 120.0;
const MODERATE_BELOW_WPM: f64 = 160.0;

/// Words per minute over the speech span. Every token counts, fillers
/// included.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SpeakingRate {
    pub speed_wpm: f64,
    pub word_count: usize,
    pub span_s: f64,
}

impl SpeakingRate {
    pub fn from_words(words: &[WordToken]) -> Self {
        let span_s = match (words.first(), words.last()) {
            (Some(first), Some(last)) => last.end - first.start,
            _ => 0.0,
        };
        Self::new(words.len(), span_s)
    }

    pub fn new(word_count: usize, span_s: f64) -> Self {
        let speed_wpm = if span_s > 0.0 {
            word_count as f64 * 60.0 / span_s
        } else {
            0.0
        };
        Self {
            speed_wpm,
            word_count,
            span_s,
        }
    }

    pub fn pace(&self) -> Pace {
        Pace::classify(self.speed_wpm)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Undetermined,
    Slow,
    Moderate,
    Fast,
}

impl Pace {
    pub fn classify(speed_wpm: f64) -> Self {
        if speed_wpm.is_nan() || speed_wpm <= 0.0 {
            Self::Undetermined
        } else if speed_wpm < SLOW_BELOW_WPM {
            Self::Slow
        } else if speed_wpm < MODERATE_BELOW_WPM {
            Self::Moderate
        } else {
            Self::Fast
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undetermined => "undetermined",
            Self::Slow => "slow",
            Self::Moderate => "moderate",
            Self::Fast => "fast",
        }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
