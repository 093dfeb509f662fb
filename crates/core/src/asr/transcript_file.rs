use crate::asr::{AsrError, Transcriber, Transcript, WordToken};
use crate::decode::AudioClip;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const SIDECAR_SUFFIX: &str = "words.json";

/// Reads word timings produced ahead of time by an external recogniser.
///
/// With no explicit path the transcript is looked up next to the recording
/// as `<recording>.words.json`.
#[derive(Clone, Debug, Default)]
pub struct TranscriptFileTranscriber {
    path: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Full {
        #[serde(default)]
        text: Option<String>,
        words: Vec<WordToken>,
    },
    Words(Vec<WordToken>),
}

impl TranscriptFileTranscriber {
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn sidecar() -> Self {
        Self { path: None }
    }

    pub fn sidecar_path(source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_owned();
        name.push(".");
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Transcript, AsrError> {
        let parsed: TranscriptFile =
            serde_json::from_str(raw).map_err(|source| AsrError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let transcript = match parsed {
            TranscriptFile::Full {
                text: Some(text),
                words,
            } => Transcript {
                text: text.trim().to_owned(),
                words,
            },
            TranscriptFile::Full { text: None, words } | TranscriptFile::Words(words) => {
                Transcript::from_words(words)
            }
        };
        transcript.validated()
    }
}

impl Transcriber for TranscriptFileTranscriber {
    fn transcribe<'a>(
        &'a self,
        source: &'a Path,
        _clip: &'a AudioClip,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>> {
        async move {
            let path = self
                .path
                .clone()
                .unwrap_or_else(|| Self::sidecar_path(source));
            tracing::debug!(path = %path.display(), "loading transcript file");
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| AsrError::Io {
                    path: path.clone(),
                    source,
                })?;
            Self::parse(&path, &raw)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_word_list() {
        let raw = r#"[{"text":"Hello","start":0.0,"end":0.4},{"word":"there","start":0.5,"end":0.8}]"#;
        let t = TranscriptFileTranscriber::parse(Path::new("t.json"), raw).unwrap();
        assert_eq!(t.text, "Hello there");
        assert_eq!(t.words.len(), 2);
    }

    #[test]
    fn keeps_explicit_text() {
        let raw = r#"{"text":" Hello, there. ","words":[{"text":"Hello,","start":0.0,"end":0.4}]}"#;
        let t = TranscriptFileTranscriber::parse(Path::new("t.json"), raw).unwrap();
        assert_eq!(t.text, "Hello, there.");
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = TranscriptFileTranscriber::parse(Path::new("t.json"), "{nope").unwrap_err();
        assert!(matches!(err, AsrError::Json { .. }));
    }

    #[test]
    fn sidecar_sits_next_to_recording() {
        assert_eq!(
            TranscriptFileTranscriber::sidecar_path(Path::new("/tmp/talk.wav")),
            PathBuf::from("/tmp/talk.wav.words.json")
        );
    }

    #[tokio::test]
    async fn reads_sidecar_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("talk.wav");
        std::fs::write(
            TranscriptFileTranscriber::sidecar_path(&audio),
            r#"[{"text":"hi","start":0.2,"end":0.4}]"#,
        )
        .unwrap();
        let clip = AudioClip::new(16_000, vec![0.0; 16]);
        let t = TranscriptFileTranscriber::sidecar()
            .transcribe(&audio, &clip)
            .await
            .unwrap();
        assert_eq!(t.words, vec![WordToken::new("hi", 0.2, 0.4)]);
    }
}
