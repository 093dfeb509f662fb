use crate::asr::WordToken;
use crate::text::strip_punctuation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_REPETITIONS: usize = 5;
const MIN_WORD_CHARS: usize = 3;

pub const STOP_WORDS: &[&str] = &[
    "the", "and", "but", "for", "nor", "yet", "not", "are", "was", "were", "been", "being",
    "has", "have", "had", "does", "did", "doing", "will", "would", "should", "could", "can",
    "may", "might", "must", "shall", "you", "your", "yours", "she", "her", "hers", "him", "his",
    "its", "our", "ours", "they", "them", "their", "theirs", "this", "that", "these", "those",
    "what", "which", "who", "whom", "with", "from", "into", "onto", "than", "then", "there",
    "here", "when", "where", "why", "how", "all", "any", "some", "just", "also", "very", "too",
    "about", "because", "while", "out", "off", "over", "under", "again", "get", "got",
    "say", "said", "one", "i'm", "it's", "don't", "that's",
];

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RepetitionReport {
    /// Share of words that are extra occurrences of an eligible word, 0..=100.
    pub percentage: f64,
    pub repeated_words: BTreeMap<String, usize>,
    pub top_repetitions: Vec<(String, usize)>,
    /// Sum of `count - 1` over repeated words.
    pub total_repeated_instances: usize,
}

/// Counts content-word reuse. Words of two characters or fewer and stop words
/// are ignored; the denominator is every non-empty word.
pub fn analyze_repetition(words: &[WordToken]) -> RepetitionReport {
    let cleaned: Vec<String> = words
        .iter()
        .map(|w| strip_punctuation(&w.text))
        .filter(|w| !w.is_empty())
        .collect();
    let total = cleaned.len();

    // first-seen order doubles as the tie-break for the top list
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for word in cleaned {
        if word.chars().count() < MIN_WORD_CHARS || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        match index.get(&word) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(word.clone(), order.len());
                order.push((word, 1));
            }
        }
    }

    let mut repeated: Vec<(String, usize)> = order.into_iter().filter(|(_, c)| *c > 1).collect();
    let total_repeated_instances: usize = repeated.iter().map(|(_, c)| c - 1).sum();
    let percentage = if total > 0 {
        (total_repeated_instances as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let repeated_words = repeated.iter().cloned().collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1));
    repeated.truncate(TOP_REPETITIONS);

    RepetitionReport {
        percentage,
        repeated_words,
        top_repetitions: repeated,
        total_repeated_instances,
    }
}
