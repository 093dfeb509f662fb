use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use speech_delivery_core::asr::{Transcriber, TranscriptFileTranscriber};
use speech_delivery_core::config::{
    resolve_api_key, resolve_optional_string, resolve_path_with_default, AnalysisConfig, ApiKey,
    Env, OpenRunPolicy, SpeakingContext, StdEnv, DEFAULT_CONTEXT, ENV_ARTIFACT_DIR,
    ENV_EMOTION_CLASSIFIER_CMD, ENV_GEMINI_API_KEY,
};
use speech_delivery_core::decode::AudioDecoder;
use speech_delivery_core::emotion::CommandEmotionClassifier;
use speech_delivery_core::pipeline::{AnalysisRequest, Analyzer};
use speech_delivery_core::recommend::{GeminiRecommender, DEFAULT_GEMINI_MODEL};
use speech_delivery_core::util::RetryConfig;

#[derive(Parser, Debug)]
#[command(name = "speech-delivery")]
#[command(about = "Delivery metrics and coaching feedback for a recorded speech")]
struct Args {
    /// Recording to analyse.
    #[arg(long)]
    audio: PathBuf,

    #[arg(long, default_value = DEFAULT_CONTEXT)]
    context: String,

    /// Free-text facial expression summary forwarded to the recommender.
    #[arg(long)]
    face_analysis: Option<String>,

    /// Word timings as JSON. Defaults to `<audio>.words.json`.
    #[arg(long)]
    transcript: Option<PathBuf>,

    #[cfg(feature = "whisper-rs")]
    #[arg(long)]
    whisper_model: Option<PathBuf>,

    #[cfg(feature = "whisper-rs")]
    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    gemini_api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Attempts per Gemini request, including the first.
    #[arg(long, default_value_t = 3)]
    gemini_max_attempts: u32,

    #[arg(long, default_value_t = 500)]
    gemini_retry_delay_ms: u64,

    /// External classifier invoked with the trimmed WAV path.
    #[arg(long)]
    emotion_cmd: Option<String>,

    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Count silence touching the start or end of the speech as a pause.
    #[arg(long, default_value_t = false)]
    close_open_pauses: bool,

    #[arg(long, default_value_t = false)]
    no_repetition: bool,

    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

struct CliConfig {
    request: AnalysisRequest,
    analysis: AnalysisConfig,
    transcript: Option<PathBuf>,
    #[cfg(feature = "whisper-rs")]
    whisper_model: Option<PathBuf>,
    #[cfg(feature = "whisper-rs")]
    language: Option<String>,
    gemini_api_key: Option<ApiKey>,
    gemini_model: String,
    gemini_retry: RetryConfig,
    emotion_cmd: Option<String>,
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        audio = %cfg.request.audio_path.display(),
        context = %cfg.request.context,
        artifact_dir = %cfg.analysis.artifact_dir.display(),
        recommendations = cfg.gemini_api_key.is_some(),
        "config loaded"
    );

    run_analysis(cfg).await
}

async fn run_analysis(cfg: CliConfig) -> anyhow::Result<()> {
    let decoder = build_decoder(&cfg);
    let transcriber = build_transcriber(&cfg)?;

    let mut analyzer = Analyzer::new(cfg.analysis.clone(), decoder, transcriber)?;
    if let Some(line) = cfg.emotion_cmd.as_deref() {
        match CommandEmotionClassifier::from_command_line(line) {
            Some(classifier) => analyzer = analyzer.with_emotion_classifier(Arc::new(classifier)),
            None => tracing::warn!("blank emotion classifier command, using prosody heuristic"),
        }
    }
    if let Some(key) = cfg.gemini_api_key.clone() {
        let recommender = GeminiRecommender::with_model(key, &cfg.gemini_model)?
            .with_retry(cfg.gemini_retry.clone());
        analyzer = analyzer.with_recommender(Arc::new(recommender));
    } else {
        tracing::info!("no Gemini API key, skipping recommendations");
    }

    let report = analyzer
        .analyze(&cfg.request)
        .await
        .with_context(|| format!("analysis of {} failed", cfg.request.audio_path.display()))?;

    let json = if cfg.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

#[cfg(feature = "ffmpeg-sidecar")]
fn build_decoder(cfg: &CliConfig) -> Arc<dyn AudioDecoder> {
    Arc::new(speech_delivery_core::decode::FfmpegAudioDecoder::new(
        cfg.analysis.sample_rate_hz,
    ))
}

#[cfg(not(feature = "ffmpeg-sidecar"))]
fn build_decoder(_cfg: &CliConfig) -> Arc<dyn AudioDecoder> {
    Arc::new(speech_delivery_core::decode::WavDecoder::new())
}

fn build_transcriber(cfg: &CliConfig) -> anyhow::Result<Arc<dyn Transcriber>> {
    if let Some(path) = cfg.transcript.clone() {
        return Ok(Arc::new(TranscriptFileTranscriber::new(path)));
    }

    #[cfg(feature = "whisper-rs")]
    if let Some(model) = cfg.whisper_model.as_deref() {
        let whisper =
            speech_delivery_core::asr::WhisperTranscriber::new(model, cfg.language.clone())
                .with_context(|| format!("failed to load whisper model {}", model.display()))?;
        return Ok(Arc::new(whisper));
    }

    Ok(Arc::new(TranscriptFileTranscriber::sidecar()))
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<CliConfig> {
    let context: SpeakingContext = args.context.parse()?;

    let mut analysis = AnalysisConfig {
        artifact_dir: resolve_path_with_default(
            args.artifact_dir,
            ENV_ARTIFACT_DIR,
            env,
            std::env::temp_dir(),
        ),
        include_repetition: !args.no_repetition,
        ..Default::default()
    };
    if args.close_open_pauses {
        analysis.pause.open_runs = OpenRunPolicy::Close;
    }
    analysis.validate()?;

    Ok(CliConfig {
        request: AnalysisRequest::new(args.audio)
            .with_context(context)
            .with_face_analysis(args.face_analysis),
        analysis,
        transcript: args.transcript,
        #[cfg(feature = "whisper-rs")]
        whisper_model: args.whisper_model.or_else(|| {
            resolve_optional_string(
                None,
                speech_delivery_core::config::ENV_WHISPER_MODEL_PATH,
                env,
            )
            .map(PathBuf::from)
        }),
        #[cfg(feature = "whisper-rs")]
        language: args.language,
        gemini_api_key: resolve_api_key(args.gemini_api_key, ENV_GEMINI_API_KEY, env)?,
        gemini_model: args.gemini_model,
        gemini_retry: RetryConfig::new(
            args.gemini_max_attempts,
            Duration::from_millis(args.gemini_retry_delay_ms),
        ),
        emotion_cmd: resolve_optional_string(args.emotion_cmd, ENV_EMOTION_CLASSIFIER_CMD, env),
        pretty: args.pretty,
    })
}
