//! Orchestration of one analysis: load, transcribe, trim, extract every
//! feature with local failure isolation, assemble, then ask for
//! recommendations.

mod bundle;

use crate::asr::{AsrError, Transcriber, Transcript, WordToken};
use crate::config::{AnalysisConfig, ConfigError, SpeakingContext};
use crate::decode::{AudioClip, AudioDecoder, DecodeError};
use crate::emotion::{
    EmotionClassifier, EmotionError, EmotionInput, ProsodyEmotionClassifier, ProsodyFeatures,
};
use crate::emphasis::{detect_emphasis, KWeightedLoudnessMeter, LoudnessError, LoudnessMeter};
use crate::frames::{FrameError, FrameExtractor, FrameSeries, RmsFrameExtractor};
use crate::pauses::detect_pauses;
use crate::pitch::{AutocorrelationPitchEstimator, PitchError, PitchEstimator};
use crate::rate::SpeakingRate;
use crate::recommend::{build_prompt, RecommendError, RecommendationGenerator, Recommendations};
use crate::text::{analyze_repetition, FillerDetector};
use crate::trim::{trim_to_speech, TrimError, TrimmedArtifact};
use std::path::PathBuf;
use std::sync::Arc;

pub use bundle::{AnalysisBundle, AnalysisReport};

/// Fatal failures. No bundle is produced for any of these.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("input error: {0}")]
    Input(#[from] DecodeError),

    #[error("no words were recognised, nothing to analyze")]
    EmptyTranscript,

    #[error("transcription failed: {0}")]
    Transcription(#[from] AsrError),

    #[error("failed to write trimmed audio to {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

impl From<TrimError> for AnalysisError {
    fn from(e: TrimError) -> Self {
        match e {
            TrimError::EmptyTranscript => AnalysisError::EmptyTranscript,
            TrimError::Artifact { path, source } => AnalysisError::Artifact { path, source },
        }
    }
}

/// A single feature that could not be produced. Logged and omitted.
#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    #[error("loudness contour: {0}")]
    Frames(#[from] FrameError),

    #[error("pitch: {0}")]
    Pitch(#[from] PitchError),

    #[error("emotion: {0}")]
    Emotion(#[from] EmotionError),

    #[error("loudness: {0}")]
    Loudness(#[from] LoudnessError),

    #[error("loudness is not finite")]
    NonFiniteLoudness,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Trimming,
    FeatureExtraction,
    Assembled,
    Failed,
}

impl AnalysisState {
    /// Only loading and trimming can fail an analysis.
    pub fn can_advance_to(self, next: AnalysisState) -> bool {
        use AnalysisState::*;
        matches!(
            (self, next),
            (Idle, Trimming)
                | (Trimming, FeatureExtraction)
                | (FeatureExtraction, Assembled)
                | (Idle | Trimming, Failed)
        )
    }
}

#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub audio_path: PathBuf,
    pub context: SpeakingContext,
    pub face_analysis: Option<String>,
}

impl AnalysisRequest {
    pub fn new(audio_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            context: SpeakingContext::default(),
            face_analysis: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: SpeakingContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_face_analysis(mut self, face_analysis: Option<String>) -> Self {
        self.face_analysis = face_analysis;
        self
    }
}

struct Progress {
    history: Vec<AnalysisState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            history: vec![AnalysisState::Idle],
        }
    }

    fn state(&self) -> AnalysisState {
        self.history
            .last()
            .copied()
            .unwrap_or(AnalysisState::Idle)
    }

    fn advance(&mut self, next: AnalysisState) {
        let from = self.state();
        debug_assert!(from.can_advance_to(next), "{from:?} -> {next:?}");
        tracing::debug!(?from, to = ?next, "analysis state");
        self.history.push(next);
    }

    fn fail(&mut self, error: AnalysisError) -> AnalysisError {
        tracing::error!(state = ?self.state(), error = %error, "analysis failed");
        self.advance(AnalysisState::Failed);
        error
    }
}

/// Runs analyses against injected collaborators. Cheap to share; every call
/// owns its own trimmed artifact.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    decoder: Arc<dyn AudioDecoder>,
    transcriber: Arc<dyn Transcriber>,
    frames: Arc<dyn FrameExtractor>,
    meter: Arc<dyn LoudnessMeter>,
    pitch: Arc<dyn PitchEstimator>,
    emotion: Arc<dyn EmotionClassifier>,
    recommender: Option<Arc<dyn RecommendationGenerator>>,
    fillers: FillerDetector,
}

impl Analyzer {
    pub fn new(
        config: AnalysisConfig,
        decoder: Arc<dyn AudioDecoder>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            frames: Arc::new(RmsFrameExtractor::new(config.pause.frame_rate_hz)),
            meter: Arc::new(KWeightedLoudnessMeter::new()),
            pitch: Arc::new(AutocorrelationPitchEstimator::new()),
            emotion: Arc::new(ProsodyEmotionClassifier::new()),
            recommender: None,
            fillers: FillerDetector::default(),
            config,
            decoder,
            transcriber,
        })
    }

    #[must_use]
    pub fn with_frame_extractor(mut self, frames: Arc<dyn FrameExtractor>) -> Self {
        self.frames = frames;
        self
    }

    #[must_use]
    pub fn with_loudness_meter(mut self, meter: Arc<dyn LoudnessMeter>) -> Self {
        self.meter = meter;
        self
    }

    #[must_use]
    pub fn with_pitch_estimator(mut self, pitch: Arc<dyn PitchEstimator>) -> Self {
        self.pitch = pitch;
        self
    }

    #[must_use]
    pub fn with_emotion_classifier(mut self, emotion: Arc<dyn EmotionClassifier>) -> Self {
        self.emotion = emotion;
        self
    }

    #[must_use]
    pub fn with_recommender(mut self, recommender: Arc<dyn RecommendationGenerator>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    #[must_use]
    pub fn with_filler_detector(mut self, fillers: FillerDetector) -> Self {
        self.fillers = fillers;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisReport, AnalysisError> {
        let mut progress = Progress::new();
        self.run(request, &mut progress).await
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        progress: &mut Progress,
    ) -> Result<AnalysisReport, AnalysisError> {
        tracing::info!(
            audio = %request.audio_path.display(),
            context = %request.context,
            "analysis started"
        );

        let (clip, transcript) = match self.load(request).await {
            Ok(loaded) => loaded,
            Err(e) => return Err(progress.fail(e)),
        };

        progress.advance(AnalysisState::Trimming);
        let (trimmed, words) = trim_to_speech(&clip, &transcript.words)
            .map_err(|e| progress.fail(e.into()))?;
        let artifact = TrimmedArtifact::write(&self.config.artifact_dir, &trimmed)
            .map_err(|e| progress.fail(e.into()))?;

        progress.advance(AnalysisState::FeatureExtraction);
        let bundle = self
            .extract_features(&transcript.text, &trimmed, &words, &artifact)
            .await;
        drop(artifact);
        progress.advance(AnalysisState::Assembled);

        tracing::info!(
            speed_wpm = bundle.speed_wpm,
            word_count = bundle.word_count,
            pauses = bundle.pause_durations_s.as_ref().map(Vec::len),
            emphasized = bundle.emphasized_words.len(),
            fillers = bundle.filler_words.len(),
            "analysis assembled"
        );

        let recommendations = self.recommend(&bundle, request).await;
        Ok(AnalysisReport {
            bundle,
            recommendations,
        })
    }

    async fn load(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(AudioClip, Transcript), AnalysisError> {
        let path = &request.audio_path;
        if !path.exists() {
            return Err(DecodeError::NotFound(path.clone()).into());
        }
        let clip = self.decoder.decode(path).await?;
        tracing::debug!(
            sample_rate_hz = clip.sample_rate_hz,
            duration_s = clip.duration_secs(),
            "audio decoded"
        );
        let transcript = self.transcriber.transcribe(path, &clip).await?;
        if transcript.is_empty() {
            return Err(AnalysisError::EmptyTranscript);
        }
        tracing::debug!(words = transcript.words.len(), "transcribed");
        Ok((clip, transcript))
    }

    async fn extract_features(
        &self,
        transcription: &str,
        clip: &AudioClip,
        words: &[WordToken],
        artifact: &TrimmedArtifact,
    ) -> AnalysisBundle {
        let rate = SpeakingRate::from_words(words);
        let filler_words = self.fillers.detect(words, transcription);
        let repetition = self
            .config
            .include_repetition
            .then(|| analyze_repetition(words));
        let emphasized_words =
            detect_emphasis(clip, words, self.meter.as_ref(), &self.config.emphasis);
        let loudness = feature("loudness", self.clip_loudness(clip));

        let (series, pitch) = tokio::join!(self.frames.loudness(clip), self.pitch.estimate(clip));
        let series = feature("loudness contour", series.map_err(FeatureError::from));
        let pause_durations_s = series
            .as_ref()
            .map(|s| detect_pauses(s, &self.config.pause));
        let intensity = series.as_ref().and_then(FrameSeries::intensity);
        let pitch_stats = feature("pitch", pitch.map_err(FeatureError::from));

        let prosody = ProsodyFeatures::from_clip(
            clip,
            pitch_stats
                .filter(|p| p.is_voiced())
                .map(|p| p.mean as f32),
            (rate.speed_wpm > 0.0).then_some(rate.speed_wpm as f32),
        );
        let input = EmotionInput {
            artifact_path: artifact.path().to_path_buf(),
            prosody,
            transcript: transcription.to_owned(),
        };
        let tone_score = feature(
            "emotion",
            self.emotion.classify(&input).await.map_err(FeatureError::from),
        );

        AnalysisBundle {
            transcription: transcription.to_owned(),
            speed_wpm: rate.speed_wpm,
            word_count: rate.word_count,
            speech_span_s: rate.span_s,
            pause_durations_s,
            tone_score,
            loudness,
            intensity,
            pitch_stats,
            emphasized_words,
            filler_words,
            repetition,
        }
    }

    fn clip_loudness(&self, clip: &AudioClip) -> Result<f64, FeatureError> {
        let l = self.meter.integrated(&clip.samples, clip.sample_rate_hz)?;
        if l.is_finite() {
            Ok(l)
        } else {
            Err(FeatureError::NonFiniteLoudness)
        }
    }

    async fn recommend(
        &self,
        bundle: &AnalysisBundle,
        request: &AnalysisRequest,
    ) -> Option<Recommendations> {
        let generator = self.recommender.as_ref()?;
        let prompt = build_prompt(bundle, request.context, request.face_analysis.as_deref());
        let result: Result<Recommendations, RecommendError> = async {
            let reply = generator.generate(&prompt).await?;
            Recommendations::parse(&reply)
        }
        .await;

        match result {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(error = %e, "recommendations unavailable");
                None
            }
        }
    }
}

fn feature<T>(name: &'static str, result: Result<T, FeatureError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(feature = name, error = %e, "feature extraction failed, omitting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{write_wav, WavDecoder};
    use crate::emotion::ToneScore;
    use crate::pitch::PitchStats;
    use crate::recommend::{close_marker, open_marker, SECTIONS_PER_KIND};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::path::Path;
    use std::sync::Mutex;

    const SR: u32 = 16_000;

    struct FixedTranscriber(Result<Vec<WordToken>, String>);

    impl Transcriber for FixedTranscriber {
        fn transcribe<'a>(
            &'a self,
            _source: &'a Path,
            _clip: &'a AudioClip,
        ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
            let out = match &self.0 {
                Ok(words) => Ok(Transcript::from_words(words.clone())),
                Err(msg) => Err(AsrError::Engine(msg.clone())),
            };
            async move { out }.boxed()
        }
    }

    struct FixedPitch(Option<PitchStats>);

    impl PitchEstimator for FixedPitch {
        fn estimate<'a>(
            &'a self,
            _clip: &'a AudioClip,
        ) -> BoxFuture<'a, Result<PitchStats, PitchError>> {
            let out = self.0.ok_or(PitchError::ZeroSampleRate);
            async move { out }.boxed()
        }
    }

    struct BrokenFrames;

    impl FrameExtractor for BrokenFrames {
        fn loudness<'a>(
            &'a self,
            _clip: &'a AudioClip,
        ) -> BoxFuture<'a, Result<FrameSeries, FrameError>> {
            async { Err(FrameError::InvalidFrameRate(0.0)) }.boxed()
        }
    }

    /// Records the artifact it was handed and whether it existed at the time.
    #[derive(Default)]
    struct SpyEmotion {
        seen: Mutex<Option<(PathBuf, bool)>>,
    }

    impl EmotionClassifier for SpyEmotion {
        fn classify<'a>(
            &'a self,
            input: &'a EmotionInput,
        ) -> BoxFuture<'a, Result<ToneScore, EmotionError>> {
            async move {
                let path = input.artifact_path.clone();
                let exists = path.exists();
                *self.seen.lock().unwrap() = Some((path, exists));
                Ok(ToneScore {
                    label: "neutral".to_owned(),
                    scores: [("neutral".to_owned(), 1.0)].into_iter().collect(),
                })
            }
            .boxed()
        }
    }

    struct CannedRecommender {
        reply: Result<String, String>,
        prompt: Mutex<Option<String>>,
    }

    impl CannedRecommender {
        fn new(reply: Result<String, String>) -> Self {
            Self {
                reply,
                prompt: Mutex::new(None),
            }
        }
    }

    impl RecommendationGenerator for CannedRecommender {
        fn generate<'a>(
            &'a self,
            prompt: &'a str,
        ) -> BoxFuture<'a, Result<String, RecommendError>> {
            *self.prompt.lock().unwrap() = Some(prompt.to_owned());
            let out = self.reply.clone().map_err(RecommendError::Unavailable);
            async move { out }.boxed()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        audio: PathBuf,
        artifacts: PathBuf,
    }

    impl Fixture {
        /// Six seconds of tone with silence between 1.5 s and 2.5 s.
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let audio = dir.path().join("talk.wav");
            let artifacts = dir.path().join("artifacts");
            std::fs::create_dir(&artifacts).unwrap();

            let samples: Vec<f32> = (0..6 * SR as usize)
                .map(|i| {
                    let t = i as f64 / f64::from(SR);
                    if (1.5..2.5).contains(&t) {
                        0.0
                    } else {
                        (0.3 * (2.0 * std::f64::consts::PI * 220.0 * t).sin()) as f32
                    }
                })
                .collect();
            write_wav(&audio, &AudioClip::new(SR, samples)).unwrap();
            Self {
                _dir: dir,
                audio,
                artifacts,
            }
        }

        fn config(&self) -> AnalysisConfig {
            AnalysisConfig {
                artifact_dir: self.artifacts.clone(),
                ..Default::default()
            }
        }

        fn leftover_artifacts(&self) -> usize {
            std::fs::read_dir(&self.artifacts)
                .map(|d| d.count())
                .unwrap_or(0)
        }
    }

    fn scenario_words() -> Vec<WordToken> {
        vec![
            WordToken::new("the", 0.0, 0.2),
            WordToken::new("um", 1.0, 1.3),
            WordToken::new("the", 5.0, 5.2),
        ]
    }

    fn voiced() -> PitchStats {
        PitchStats::from_f0(&[210.0, 220.0, 230.0])
    }

    fn analyzer(fx: &Fixture, words: Result<Vec<WordToken>, String>) -> Analyzer {
        Analyzer::new(
            fx.config(),
            Arc::new(WavDecoder::new()),
            Arc::new(FixedTranscriber(words)),
        )
        .unwrap()
        .with_pitch_estimator(Arc::new(FixedPitch(Some(voiced()))))
    }

    fn nine_sections() -> String {
        let mut reply = String::new();
        for tag in ["STRENGTH", "WEAKNESS", "LANGUAGE"] {
            for n in 1..=SECTIONS_PER_KIND {
                reply.push_str(&open_marker(tag, n));
                reply.push_str(&format!("{tag} {n}"));
                reply.push_str(&close_marker(tag, n));
            }
        }
        reply
    }

    #[test]
    fn state_transitions() {
        use AnalysisState::*;
        assert!(Idle.can_advance_to(Trimming));
        assert!(Trimming.can_advance_to(Failed));
        assert!(FeatureExtraction.can_advance_to(Assembled));
        assert!(!FeatureExtraction.can_advance_to(Failed));
        assert!(!Idle.can_advance_to(Assembled));
        assert!(!Assembled.can_advance_to(Trimming));
    }

    #[tokio::test]
    async fn short_scenario_end_to_end() {
        let fx = Fixture::new();
        let report = analyzer(&fx, Ok(scenario_words()))
            .analyze(&AnalysisRequest::new(&fx.audio))
            .await
            .unwrap();
        let b = report.bundle;

        assert_eq!(b.transcription, "the um the");
        assert_eq!(b.filler_words, vec!["um"]);
        let rep = b.repetition.unwrap();
        assert_eq!(rep.percentage, 0.0);
        assert!(rep.repeated_words.is_empty());
        assert_eq!(b.word_count, 3);
        assert_eq!(b.speed_wpm, 3.0 * 60.0 / 5.2);
        assert!((b.speech_span_s - 5.2).abs() < 1e-12);
        assert!(b.loudness.is_some_and(f64::is_finite));
        assert_eq!(b.pitch_stats, Some(voiced()));
        assert!(b.tone_score.is_some());
        assert!(report.recommendations.is_none());
        assert_eq!(fx.leftover_artifacts(), 0);
    }

    #[tokio::test]
    async fn silent_gap_inside_speech_is_a_pause() {
        let fx = Fixture::new();
        let words = vec![
            WordToken::new("first", 0.5, 1.0),
            WordToken::new("second", 3.0, 3.5),
        ];
        let report = analyzer(&fx, Ok(words))
            .analyze(&AnalysisRequest::new(&fx.audio))
            .await
            .unwrap();
        let pauses = report.bundle.pause_durations_s.unwrap();
        assert_eq!(pauses.len(), 1);
        assert!((pauses[0] - 1.0).abs() <= 0.03, "got {}", pauses[0]);

        assert!((report.bundle.speech_span_s - 3.0).abs() < 1e-12);
        let intensity = report.bundle.intensity.unwrap();
        assert!(intensity.min < -90.0, "min {}", intensity.min);
        assert!(intensity.max > -20.0, "max {}", intensity.max);
        assert!(intensity.min < intensity.mean && intensity.mean < intensity.max);
        assert!(intensity.variability > 0.0);
    }

    #[tokio::test]
    async fn broken_loudness_contour_drops_pauses_and_intensity_only() {
        let fx = Fixture::new();
        let report = analyzer(&fx, Ok(scenario_words()))
            .with_frame_extractor(Arc::new(BrokenFrames))
            .analyze(&AnalysisRequest::new(&fx.audio))
            .await
            .unwrap();
        let b = report.bundle;
        assert!(b.pause_durations_s.is_none());
        assert!(b.intensity.is_none());
        assert!(b.pitch_stats.is_some());
        assert!(b.loudness.is_some());
    }

    #[tokio::test]
    async fn steps_run_in_order_and_artifact_is_live_during_features() {
        let fx = Fixture::new();
        let spy = Arc::new(SpyEmotion::default());
        let a = analyzer(&fx, Ok(scenario_words())).with_emotion_classifier(spy.clone());

        let mut progress = Progress::new();
        a.run(&AnalysisRequest::new(&fx.audio), &mut progress)
            .await
            .unwrap();

        use AnalysisState::*;
        assert_eq!(
            progress.history,
            vec![Idle, Trimming, FeatureExtraction, Assembled]
        );
        let (path, existed) = spy.seen.lock().unwrap().clone().unwrap();
        assert!(existed);
        assert!(path.starts_with(&fx.artifacts));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_source_fails_before_anything_runs() {
        let fx = Fixture::new();
        let mut progress = Progress::new();
        let err = analyzer(&fx, Ok(scenario_words()))
            .run(&AnalysisRequest::new(fx.artifacts.join("missing.wav")), &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Input(DecodeError::NotFound(_))));
        assert_eq!(progress.history, vec![AnalysisState::Idle, AnalysisState::Failed]);
    }

    #[tokio::test]
    async fn empty_transcript_is_fatal() {
        let fx = Fixture::new();
        let err = analyzer(&fx, Ok(vec![]))
            .analyze(&AnalysisRequest::new(&fx.audio))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyTranscript));
        assert_eq!(fx.leftover_artifacts(), 0);
    }

    #[tokio::test]
    async fn transcription_failure_is_fatal() {
        let fx = Fixture::new();
        let err = analyzer(&fx, Err("model crashed".to_owned()))
            .analyze(&AnalysisRequest::new(&fx.audio))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Transcription(_)));
    }

    #[tokio::test]
    async fn unwritable_artifact_dir_fails_during_trimming() {
        let fx = Fixture::new();
        let config = AnalysisConfig {
            artifact_dir: fx.artifacts.join("does/not/exist"),
            ..Default::default()
        };
        let a = Analyzer::new(
            config,
            Arc::new(WavDecoder::new()),
            Arc::new(FixedTranscriber(Ok(scenario_words()))),
        )
        .unwrap();
        let mut progress = Progress::new();
        let err = a
            .run(&AnalysisRequest::new(&fx.audio), &mut progress)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Artifact { .. }));
        use AnalysisState::*;
        assert_eq!(progress.history, vec![Idle, Trimming, Failed]);
    }

    #[tokio::test]
    async fn failing_feature_is_omitted_not_fatal() {
        let fx = Fixture::new();
        let report = analyzer(&fx, Ok(scenario_words()))
            .with_pitch_estimator(Arc::new(FixedPitch(None)))
            .analyze(&AnalysisRequest::new(&fx.audio))
            .await
            .unwrap();
        assert!(report.bundle.pitch_stats.is_none());
        assert!(report.bundle.pause_durations_s.is_some());
        assert!(report.bundle.tone_score.is_some());

        let json = serde_json::to_value(&report.bundle).unwrap();
        assert!(json.get("pitch_stats").is_none());
        assert_eq!(json["filler_words"][0], "um");
    }

    #[tokio::test]
    async fn repetition_can_be_switched_off() {
        let fx = Fixture::new();
        let config = AnalysisConfig {
            include_repetition: false,
            ..fx.config()
        };
        let a = Analyzer::new(
            config,
            Arc::new(WavDecoder::new()),
            Arc::new(FixedTranscriber(Ok(scenario_words()))),
        )
        .unwrap()
        .with_pitch_estimator(Arc::new(FixedPitch(Some(voiced()))));
        let report = a.analyze(&AnalysisRequest::new(&fx.audio)).await.unwrap();
        assert!(report.bundle.repetition.is_none());
    }

    #[tokio::test]
    async fn recommendations_are_parsed_from_reply() {
        let fx = Fixture::new();
        let recommender = Arc::new(CannedRecommender::new(Ok(nine_sections())));
        let request = AnalysisRequest::new(&fx.audio)
            .with_context(SpeakingContext::Pitch)
            .with_face_analysis(Some("smiling throughout".to_owned()));
        let report = analyzer(&fx, Ok(scenario_words()))
            .with_recommender(recommender.clone())
            .analyze(&request)
            .await
            .unwrap();

        let recs = report.recommendations.unwrap();
        assert_eq!(recs.strengths[0], "STRENGTH 1");
        assert_eq!(recs.language_points[2], "LANGUAGE 3");
        let prompt = recommender.prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains(SpeakingContext::Pitch.prompt_modifier()));
        assert!(prompt.contains("smiling throughout"));
    }

    #[tokio::test]
    async fn unavailable_recommender_still_returns_bundle() {
        let fx = Fixture::new();
        for reply in [Err("offline".to_owned()), Ok("no markers here".to_owned())] {
            let report = analyzer(&fx, Ok(scenario_words()))
                .with_recommender(Arc::new(CannedRecommender::new(reply)))
                .analyze(&AnalysisRequest::new(&fx.audio))
                .await
                .unwrap();
            assert!(report.recommendations.is_none());
            assert_eq!(report.bundle.filler_words, vec!["um"]);
        }
    }
}
