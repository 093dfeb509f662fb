use crate::asr::WordToken;
use crate::text::strip_trailing_punctuation;

pub const SINGLE_WORD_FILLERS: &[&str] = &[
    "um",
    "uh",
    "er",
    "ah",
    "hmm",
    "like",
    "so",
    "actually",
    "basically",
    "literally",
];

pub const FILLER_PHRASES: &[&str] = &["you know", "i mean", "i guess", "kind of", "sort of"];

/// Matches single-word fillers per token and multi-word fillers by substring
/// count over the lowercased transcript.
///
/// Phrase matching is not word-aligned, so "i mean" also fires inside
/// "hi meant". That overcount is accepted.
#[derive(Clone, Debug)]
pub struct FillerDetector {
    words: Vec<String>,
    phrases: Vec<String>,
}

impl Default for FillerDetector {
    fn default() -> Self {
        Self::new(
            SINGLE_WORD_FILLERS.iter().map(|s| s.to_string()),
            FILLER_PHRASES.iter().map(|s| s.to_string()),
        )
    }
}

impl FillerDetector {
    pub fn new(
        words: impl IntoIterator<Item = String>,
        phrases: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            words: words.into_iter().map(|w| w.to_lowercase()).collect(),
            phrases: phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Every match, repeats included: token fillers in utterance order, then
    /// phrase fillers in vocabulary order.
    pub fn detect(&self, words: &[WordToken], transcript: &str) -> Vec<String> {
        let mut found: Vec<String> = words
            .iter()
            .map(|w| strip_trailing_punctuation(&w.text))
            .filter(|w| self.words.iter().any(|f| f == w))
            .collect();

        let lowered = transcript.to_lowercase();
        for phrase in &self.phrases {
            let n = lowered.matches(phrase.as_str()).count();
            found.extend(std::iter::repeat(phrase.clone()).take(n));
        }
        found
    }
}

pub fn detect_fillers(words: &[WordToken], transcript: &str) -> Vec<String> {
    FillerDetector::default().detect(words, transcript)
}
