use crate::asr::{AsrError, Transcriber, Transcript, WordToken};
use crate::decode::AudioClip;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const WHISPER_SAMPLE_RATE_HZ: u32 = 16_000;

/// Local whisper.cpp recogniser with token-level timestamps grouped into words.
#[derive(Clone)]
pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    language: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(model_path: &Path, language: Option<String>) -> Result<Self, AsrError> {
        let path = model_path
            .to_str()
            .ok_or_else(|| AsrError::Engine("model path is not valid UTF-8".to_owned()))?;
        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| AsrError::Engine(format!("failed to load {path}: {e}")))?;
        tracing::info!(model = path, "whisper model loaded");
        Ok(Self {
            ctx: Arc::new(ctx),
            language,
        })
    }

    fn run(
        ctx: &WhisperContext,
        language: Option<&str>,
        samples: &[f32],
    ) -> Result<Transcript, AsrError> {
        let mut state = ctx
            .create_state()
            .map_err(|e| AsrError::Engine(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        params.set_token_timestamps(true);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);

        state
            .full(params, samples)
            .map_err(|e| AsrError::Engine(e.to_string()))?;

        let mut text = String::new();
        let mut pieces = Vec::new();
        for segment in state.as_iter() {
            let segment_text = segment
                .to_str_lossy()
                .map_err(|e| AsrError::Engine(e.to_string()))?;
            text.push_str(&segment_text);
            for i in 0..segment.n_tokens() {
                let Some(token) = segment.get_token(i) else {
                    continue;
                };
                let piece = token
                    .to_str_lossy()
                    .map_err(|e| AsrError::Engine(e.to_string()))?
                    .into_owned();
                let data = token.token_data();
                pieces.push((piece, data.t0 as f64 / 100.0, data.t1 as f64 / 100.0));
            }
        }

        Ok(Transcript {
            text: text.trim().to_owned(),
            words: group_tokens_into_words(pieces),
        })
    }
}

/// Tokens that open with whitespace start a new word; special tokens such as
/// `[_BEG_]` or `<|endoftext|>` are skipped.
fn group_tokens_into_words(pieces: Vec<(String, f64, f64)>) -> Vec<WordToken> {
    let mut words: Vec<WordToken> = Vec::new();
    for (piece, t0, t1) in pieces {
        if piece.starts_with("[_") || piece.starts_with("<|") || piece.trim().is_empty() {
            continue;
        }
        let starts_word = piece.starts_with(' ') || words.is_empty();
        match words.last_mut() {
            Some(last) if !starts_word => {
                last.text.push_str(&piece);
                last.end = last.end.max(t1);
            }
            _ => words.push(WordToken::new(piece.trim(), t0, t1.max(t0))),
        }
    }
    words
}

impl Transcriber for WhisperTranscriber {
    fn transcribe<'a>(
        &'a self,
        _source: &'a Path,
        clip: &'a AudioClip,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
        async move {
            if clip.sample_rate_hz != WHISPER_SAMPLE_RATE_HZ {
                return Err(AsrError::UnsupportedAudio(format!(
                    "whisper needs {WHISPER_SAMPLE_RATE_HZ} Hz, got {} Hz",
                    clip.sample_rate_hz
                )));
            }
            let ctx = Arc::clone(&self.ctx);
            let language = self.language.clone();
            let samples = clip.samples.clone();
            tokio::task::spawn_blocking(move || Self::run(&ctx, language.as_deref(), &samples))
                .await
                .map_err(|e| AsrError::Engine(e.to_string()))?
                .and_then(Transcript::validated)
        }
        .boxed()
    }
}
