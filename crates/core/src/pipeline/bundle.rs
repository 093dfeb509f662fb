use crate::emotion::ToneScore;
use crate::frames::IntensityStats;
use crate::pitch::PitchStats;
use crate::recommend::Recommendations;
use crate::text::RepetitionReport;
use serde::{Deserialize, Serialize};

/// Metrics for one analysed recording. Optional fields are omitted from the
/// JSON form when their feature failed or its collaborator was unavailable.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisBundle {
    pub transcription: String,
    pub speed_wpm: f64,
    pub word_count: usize,
    /// First word start to last word end, in seconds.
    #[serde(default)]
    pub speech_span_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_durations_s: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_score: Option<ToneScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<IntensityStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_stats: Option<PitchStats>,
    #[serde(default)]
    pub emphasized_words: Vec<String>,
    #[serde(default)]
    pub filler_words: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition: Option<RepetitionReport>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    #[serde(rename = "analysis")]
    pub bundle: AnalysisBundle,
    pub recommendations: Option<Recommendations>,
}
