//! Transcript-level delivery metrics: filler words and word repetition.

pub mod filler;
pub mod repetition;

pub use filler::{detect_fillers, FillerDetector, FILLER_PHRASES, SINGLE_WORD_FILLERS};
pub use repetition::{analyze_repetition, RepetitionReport, STOP_WORDS};

/// Lowercased word with surrounding whitespace and trailing punctuation removed.
pub(crate) fn strip_trailing_punctuation(word: &str) -> String {
    word.trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

/// Lowercased word with punctuation removed from both ends; inner
/// apostrophes and hyphens survive.
pub(crate) fn strip_punctuation(word: &str) -> String {
    word.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}
