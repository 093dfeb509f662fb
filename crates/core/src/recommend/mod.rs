//! Recommendation generation: prompt assembly, the hosted text generator and
//! parsing of its marker-delimited reply.

mod gemini;
mod prompt;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use gemini::{GeminiRecommender, DEFAULT_GEMINI_MODEL};
pub use prompt::{build_prompt, feedback_text};

pub const SECTIONS_PER_KIND: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum RecommendError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("api error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("response blocked or empty: {0}")]
    Blocked(String),

    #[error("invalid endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("reply is missing marker {0}")]
    MissingMarker(String),

    #[error("recommendation generator unavailable: {0}")]
    Unavailable(String),
}

impl RecommendError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RecommendError::Network(e) => e.is_timeout() || e.is_connect(),
            RecommendError::Api { status, .. } => crate::util::is_http_retryable(*status),
            _ => false,
        }
    }
}

/// Hosted text generator turning a prompt into prose.
pub trait RecommendationGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, RecommendError>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SectionKind {
    Strength,
    Weakness,
    Language,
}

impl SectionKind {
    fn tag(&self) -> &'static str {
        match self {
            SectionKind::Strength => "STRENGTH",
            SectionKind::Weakness => "WEAKNESS",
            SectionKind::Language => "LANGUAGE",
        }
    }
}

pub fn open_marker(tag: &str, n: usize) -> String {
    format!("[[{tag}_{n}]]")
}

pub fn close_marker(tag: &str, n: usize) -> String {
    format!("[[/{tag}_{n}]]")
}

/// Three strengths, three weaknesses and three brief grammar or vocabulary
/// points.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Recommendations {
    pub strengths: [String; SECTIONS_PER_KIND],
    pub weaknesses: [String; SECTIONS_PER_KIND],
    pub language_points: [String; SECTIONS_PER_KIND],
}

impl Recommendations {
    /// Fails on the first marker pair that is absent or empty.
    pub fn parse(reply: &str) -> Result<Self, RecommendError> {
        Ok(Self {
            strengths: sections(reply, SectionKind::Strength)?,
            weaknesses: sections(reply, SectionKind::Weakness)?,
            language_points: sections(reply, SectionKind::Language)?,
        })
    }
}

fn sections(
    reply: &str,
    kind: SectionKind,
) -> Result<[String; SECTIONS_PER_KIND], RecommendError> {
    let mut out: [String; SECTIONS_PER_KIND] = Default::default();
    for (i, slot) in out.iter_mut().enumerate() {
        let n = i + 1;
        let open = open_marker(kind.tag(), n);
        let close = close_marker(kind.tag(), n);
        let start = reply
            .find(&open)
            .map(|p| p + open.len())
            .ok_or_else(|| RecommendError::MissingMarker(open.clone()))?;
        let len = reply[start..]
            .find(&close)
            .ok_or_else(|| RecommendError::MissingMarker(close.clone()))?;
        let body = reply[start..start + len].trim();
        if body.is_empty() {
            return Err(RecommendError::MissingMarker(open));
        }
        *slot = body.to_owned();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed_reply() -> String {
        let mut reply = String::from("Here is your feedback.\n");
        for tag in ["STRENGTH", "WEAKNESS", "LANGUAGE"] {
            for n in 1..=SECTIONS_PER_KIND {
                reply.push_str(&format!(
                    "{}\n {} point {n}\n{}\n",
                    open_marker(tag, n),
                    tag.to_lowercase(),
                    close_marker(tag, n)
                ));
            }
        }
        reply
    }

    #[test]
    fn parses_all_nine_sections() {
        let recs = Recommendations::parse(&well_formed_reply()).unwrap();
        assert_eq!(recs.strengths[0], "strength point 1");
        assert_eq!(recs.weaknesses[2], "weakness point 3");
        assert_eq!(recs.language_points[1], "language point 2");
    }

    #[test]
    fn missing_marker_is_reported_by_name() {
        let reply = well_formed_reply().replace("[[/WEAKNESS_2]]", "");
        match Recommendations::parse(&reply) {
            Err(RecommendError::MissingMarker(m)) => assert_eq!(m, "[[/WEAKNESS_2]]"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_section_counts_as_missing() {
        let reply = well_formed_reply().replace("language point 3", "   ");
        assert!(matches!(
            Recommendations::parse(&reply),
            Err(RecommendError::MissingMarker(_))
        ));
    }

    #[test]
    fn retryable_statuses() {
        let api = |status| RecommendError::Api {
            status,
            body: String::new(),
        };
        assert!(api(429).is_retryable());
        assert!(api(503).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!RecommendError::MissingMarker("x".into()).is_retryable());
    }
}
