use crate::emotion::{
    Emotion, EmotionClassifier, EmotionError, EmotionInput, ProsodyFeatures, ToneScore,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;

const QUIET_RMS: f32 = 0.02;
const LOUD_RMS: f32 = 0.1;
const HIGH_PITCH_HZ: f32 = 200.0;
const LOW_PITCH_HZ: f32 = 100.0;
const FAST_WPM: f32 = 160.0;
const SLOW_WPM: f32 = 110.0;
const KEYWORD_WEIGHT: f64 = 0.5;

const KEYWORDS: &[(Emotion, &[&str])] = &[
    (Emotion::Happy, &["happy", "joy", "excited", "glad", "delighted"]),
    (Emotion::Sad, &["sad", "depressed", "unhappy", "sorry", "miss"]),
    (Emotion::Angry, &["angry", "mad", "furious", "annoyed", "outrageous"]),
    (Emotion::Fearful, &["scared", "afraid", "fear", "worried", "nervous"]),
    (Emotion::Disgusted, &["disgust", "gross", "awful"]),
    (Emotion::Surprised, &["surprise", "amazing", "wow", "unbelievable"]),
];

/// Deterministic heuristic over energy, pitch, speaking rate and a few
/// transcript keywords. Scores are normalised to sum to one.
#[derive(Clone, Debug, Default)]
pub struct ProsodyEmotionClassifier;

impl ProsodyEmotionClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, prosody: &ProsodyFeatures, transcript: &str) -> BTreeMap<Emotion, f64> {
        let mut raw: BTreeMap<Emotion, f64> = Emotion::ALL.iter().map(|e| (*e, 0.05)).collect();
        let mut bump = |e: Emotion, by: f64| {
            if let Some(v) = raw.get_mut(&e) {
                *v += by;
            }
        };

        // arousal from energy, nudged by pace
        let level = (prosody.energy_rms - QUIET_RMS) / (LOUD_RMS - QUIET_RMS);
        let mut arousal = f64::from(level.clamp(0.0, 1.0));
        match prosody.speaking_rate_wpm {
            Some(wpm) if wpm > FAST_WPM => arousal = (arousal + 0.25).min(1.0),
            Some(wpm) if wpm > 0.0 && wpm < SLOW_WPM => arousal = (arousal - 0.25).max(0.0),
            _ => {}
        }

        bump(Emotion::Neutral, 1.0 - arousal);
        match prosody.pitch_hz {
            Some(p) if p > HIGH_PITCH_HZ => {
                bump(Emotion::Happy, arousal);
                bump(Emotion::Surprised, 0.4 * arousal);
                bump(Emotion::Fearful, 0.3 * (1.0 - arousal));
            }
            Some(p) if p < LOW_PITCH_HZ => {
                bump(Emotion::Sad, 1.2 * (1.0 - arousal));
                bump(Emotion::Angry, 0.6 * arousal);
            }
            Some(_) => {
                bump(Emotion::Happy, 0.5 * arousal);
                bump(Emotion::Angry, 0.3 * arousal);
            }
            None => bump(Emotion::Happy, 0.5 * arousal),
        }

        let lowered = transcript.to_lowercase();
        for (emotion, words) in KEYWORDS {
            let hits = words.iter().filter(|w| lowered.contains(*w)).count();
            bump(*emotion, KEYWORD_WEIGHT * hits as f64);
        }

        let total: f64 = raw.values().sum();
        raw.values_mut().for_each(|v| *v /= total);
        raw
    }
}

impl EmotionClassifier for ProsodyEmotionClassifier {
    fn classify<'a>(
        &'a self,
        input: &'a EmotionInput,
    ) -> BoxFuture<'a, Result<ToneScore, EmotionError>> {
        async move {
            let scores = self.score(&input.prosody, &input.transcript);
            let named = scores
                .into_iter()
                .map(|(e, v)| (e.as_str().to_owned(), v))
                .collect();
            ToneScore::from_scores(named).ok_or(EmotionError::AnalysisFailed)
        }
        .boxed()
    }
}
