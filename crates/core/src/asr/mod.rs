mod transcript_file;
#[cfg(feature = "whisper-rs")]
mod whisper;

use crate::decode::AudioClip;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use transcript_file::TranscriptFileTranscriber;
#[cfg(feature = "whisper-rs")]
pub use whisper::WhisperTranscriber;

/// One recognised word with its time span in seconds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WordToken {
    #[serde(alias = "word")]
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl WordToken {
    pub fn new<S: Into<String>>(text: S, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub words: Vec<WordToken>,
}

impl Transcript {
    /// Builds a transcript whose text is the words joined by single spaces.
    pub fn from_words(words: Vec<WordToken>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Checks `start <= end` per word and non-decreasing starts, then returns
    /// the transcript unchanged.
    pub fn validated(self) -> Result<Self, AsrError> {
        for (i, w) in self.words.iter().enumerate() {
            if !w.start.is_finite() || !w.end.is_finite() || w.start > w.end {
                return Err(AsrError::InvalidTiming {
                    index: i,
                    word: w.text.clone(),
                });
            }
        }
        if let Some(i) = self
            .words
            .windows(2)
            .position(|pair| pair[1].start < pair[0].start)
        {
            return Err(AsrError::InvalidTiming {
                index: i + 1,
                word: self.words[i + 1].text.clone(),
            });
        }
        Ok(self)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AsrError {
    #[error("transcript file {} could not be read: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transcript file {} is malformed: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("word {index} ({word:?}) has invalid timing")]
    InvalidTiming { index: usize, word: String },

    #[error("unsupported audio for transcription: {0}")]
    UnsupportedAudio(String),

    #[error("speech recognition failed: {0}")]
    Engine(String),
}

/// Speech-to-text collaborator: a transcript plus per-word timings for the
/// recording at `source`, whose decoded samples are `clip`.
pub trait Transcriber: Send + Sync {
    fn transcribe<'a>(
        &'a self,
        source: &'a Path,
        clip: &'a AudioClip,
    ) -> BoxFuture<'a, Result<Transcript, AsrError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_joined_from_words() {
        let t = Transcript::from_words(vec![
            WordToken::new(" Hello", 0.0, 0.4),
            WordToken::new(" world.", 0.5, 0.9),
        ]);
        assert_eq!(t.text, "Hello world.");
    }

    #[test]
    fn reversed_word_is_rejected() {
        let t = Transcript::from_words(vec![WordToken::new("x", 1.0, 0.5)]);
        assert!(matches!(
            t.validated(),
            Err(AsrError::InvalidTiming { index: 0, .. })
        ));
    }

    #[test]
    fn out_of_order_words_are_rejected() {
        let t = Transcript::from_words(vec![
            WordToken::new("b", 2.0, 2.5),
            WordToken::new("a", 1.0, 1.5),
        ]);
        assert!(matches!(
            t.validated(),
            Err(AsrError::InvalidTiming { index: 1, .. })
        ));
    }

    #[test]
    fn word_alias_deserializes() {
        let w: WordToken = serde_json::from_str(r#"{"word":"hi","start":0.1,"end":0.3}"#).unwrap();
        assert_eq!(w, WordToken::new("hi", 0.1, 0.3));
    }
}
