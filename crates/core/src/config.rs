use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

pub const DEFAULT_ANALYSIS_SAMPLE_RATE_HZ: u32 = 16_000;
pub const DEFAULT_FRAME_RATE_HZ: f64 = 100.0;
pub const DEFAULT_MIN_PAUSE_S: f64 = 0.25;
pub const DEFAULT_ROLLING_WINDOW_FRAMES: usize = 5;
pub const DEFAULT_HYSTERESIS_FRAMES: usize = 3;
pub const DEFAULT_ABSOLUTE_FLOOR_DB: f64 = -35.0;
pub const DEFAULT_RELATIVE_STD_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_EMPHASIS_STD_MULTIPLIER: f64 = 0.75;
pub const DEFAULT_CONTEXT: &str = "general";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_ARTIFACT_DIR: &str = "SPEECH_ARTIFACT_DIR";
pub const ENV_WHISPER_MODEL_PATH: &str = "WHISPER_MODEL_PATH";
pub const ENV_EMOTION_CLASSIFIER_CMD: &str = "EMOTION_CLASSIFIER_CMD";

/// Speaking situation the recording was made for. Each one carries its own
/// instruction for the recommendation generator.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingContext {
    #[default]
    General,
    Presentation,
    Interview,
    Meeting,
    Pitch,
    Lecture,
    Podcast,
    Storytelling,
    Debate,
}

impl SpeakingContext {
    pub const ALL: [SpeakingContext; 9] = [
        SpeakingContext::General,
        SpeakingContext::Presentation,
        SpeakingContext::Interview,
        SpeakingContext::Meeting,
        SpeakingContext::Pitch,
        SpeakingContext::Lecture,
        SpeakingContext::Podcast,
        SpeakingContext::Storytelling,
        SpeakingContext::Debate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakingContext::General => "general",
            SpeakingContext::Presentation => "presentation",
            SpeakingContext::Interview => "interview",
            SpeakingContext::Meeting => "meeting",
            SpeakingContext::Pitch => "pitch",
            SpeakingContext::Lecture => "lecture",
            SpeakingContext::Podcast => "podcast",
            SpeakingContext::Storytelling => "storytelling",
            SpeakingContext::Debate => "debate",
        }
    }

    pub fn prompt_modifier(&self) -> &'static str {
        match self {
            SpeakingContext::General => {
                "Provide well-rounded public speaking advice applicable to various situations."
            }
            SpeakingContext::Presentation => {
                "Focus on executive presence, clear messaging, and audience engagement for business presentations."
            }
            SpeakingContext::Interview => {
                "Emphasize confidence, clarity, and professional communication suitable for job interviews."
            }
            SpeakingContext::Meeting => {
                "Consider collaborative communication, active listening cues, and meeting facilitation skills."
            }
            SpeakingContext::Pitch => {
                "Focus on persuasive delivery, enthusiasm, and compelling narrative for sales situations."
            }
            SpeakingContext::Lecture => {
                "Emphasize educational clarity, student engagement, and knowledge transfer techniques."
            }
            SpeakingContext::Podcast => {
                "Consider conversational flow, authenticity, and audio-only communication best practices."
            }
            SpeakingContext::Storytelling => {
                "Focus on narrative flow, emotional connection, and audience engagement through stories."
            }
            SpeakingContext::Debate => {
                "Emphasize logical argumentation, confident delivery, and respectful discourse techniques."
            }
        }
    }

    /// Unknown names map to [`SpeakingContext::General`].
    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for SpeakingContext {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownContext(s.to_owned()))
    }
}

impl fmt::Display for SpeakingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

/// What to do with a silence run that touches the first or last frame and
/// therefore has only one detected edge.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpenRunPolicy {
    /// Only rise-then-fall runs count.
    #[default]
    Drop,
    /// Runs open at either end are closed at the series boundary.
    Close,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PauseConfig {
    pub frame_rate_hz: f64,
    pub min_pause_s: f64,
    pub rolling_window_frames: usize,
    pub hysteresis_frames: usize,
    pub absolute_floor: f64,
    pub relative_std_multiplier: f64,
    pub open_runs: OpenRunPolicy,
}

impl PauseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate_hz.is_nan() || self.frame_rate_hz <= 0.0 {
            return Err(ConfigError::NonPositiveFrameRate);
        }
        if self.rolling_window_frames == 0 || self.hysteresis_frames == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.min_pause_s < 0.0 {
            return Err(ConfigError::NegativeMinPause);
        }
        Ok(())
    }
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            min_pause_s: DEFAULT_MIN_PAUSE_S,
            rolling_window_frames: DEFAULT_ROLLING_WINDOW_FRAMES,
            hysteresis_frames: DEFAULT_HYSTERESIS_FRAMES,
            absolute_floor: DEFAULT_ABSOLUTE_FLOOR_DB,
            relative_std_multiplier: DEFAULT_RELATIVE_STD_MULTIPLIER,
            open_runs: OpenRunPolicy::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmphasisConfig {
    pub std_multiplier: f64,
}

impl Default for EmphasisConfig {
    fn default() -> Self {
        Self {
            std_multiplier: DEFAULT_EMPHASIS_STD_MULTIPLIER,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub sample_rate_hz: u32,
    pub pause: PauseConfig,
    pub emphasis: EmphasisConfig,
    /// Directory receiving the transient trimmed-audio artifact.
    pub artifact_dir: PathBuf,
    pub include_repetition: bool,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        self.pause.validate()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_ANALYSIS_SAMPLE_RATE_HZ,
            pause: PauseConfig::default(),
            emphasis: EmphasisConfig::default(),
            artifact_dir: std::env::temp_dir(),
            include_repetition: true,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("unknown speaking context: {0}")]
    UnknownContext(String),
    #[error("sample rate must be > 0 Hz")]
    ZeroSampleRate,
    #[error("frame rate must be > 0 Hz")]
    NonPositiveFrameRate,
    #[error("rolling and hysteresis windows must span at least one frame")]
    ZeroWindow,
    #[error("minimum pause duration must not be negative")]
    NegativeMinPause,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value.or_else(|| env.var(env_key)) {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => Ok(None),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    cli_value.or_else(|| env.var(env_key))
}

pub fn resolve_path_with_default(
    cli_value: Option<PathBuf>,
    env_key: &str,
    env: &impl Env,
    default: PathBuf,
) -> PathBuf {
    cli_value
        .or_else(|| env.var(env_key).map(PathBuf::from))
        .unwrap_or(default)
}
