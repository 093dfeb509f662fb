//! Clipping a recording to the span between its first and last word.

use crate::asr::WordToken;
use crate::decode::{self, AudioClip, DecodeError};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum TrimError {
    #[error("transcript has no words, nothing to analyze")]
    EmptyTranscript,

    #[error("failed to write trimmed audio to {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// Slices the clip to `[words[0].start, words[last].end]` and shifts every
/// word so the first one starts at zero.
///
/// The slice length is derived from the span itself rather than from two
/// independently rounded indices, so trimming an already trimmed clip
/// returns it unchanged.
pub fn trim_to_speech(
    clip: &AudioClip,
    words: &[WordToken],
) -> Result<(AudioClip, Vec<WordToken>), TrimError> {
    let (Some(first), Some(last)) = (words.first(), words.last()) else {
        return Err(TrimError::EmptyTranscript);
    };
    let start_time = first.start;
    let span = (last.end - start_time).max(0.0);

    let start = clip.sample_index(start_time);
    let len = (span * f64::from(clip.sample_rate_hz)).round() as usize;
    let end = start.saturating_add(len).min(clip.len());

    let trimmed = AudioClip::new(clip.sample_rate_hz, clip.samples[start..end].to_vec());
    let rebased = words
        .iter()
        .map(|w| WordToken {
            text: w.text.clone(),
            start: w.start - start_time,
            end: w.end - start_time,
        })
        .collect();

    tracing::debug!(
        start_time,
        end_time = last.end,
        samples = trimmed.len(),
        "trimmed to speech span"
    );
    Ok((trimmed, rebased))
}

/// Trimmed audio written to disk for collaborators that need a file. The
/// file is removed when the guard drops.
#[derive(Debug)]
pub struct TrimmedArtifact {
    path: PathBuf,
}

impl TrimmedArtifact {
    pub fn write(dir: &Path, clip: &AudioClip) -> Result<Self, TrimError> {
        let path = dir.join(format!("speech-trim-{:016x}.wav", rand::random::<u64>()));
        // guard first so a partially written file is still removed
        let artifact = Self { path };
        decode::write_wav(&artifact.path, clip).map_err(|source| TrimError::Artifact {
            path: artifact.path.clone(),
            source,
        })?;
        tracing::debug!(path = %artifact.path.display(), "trimmed artifact written");
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TrimmedArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "trimmed artifact removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove trimmed artifact"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> AudioClip {
        AudioClip::new(1_000, (0..n).map(|i| i as f32 / n as f32).collect())
    }

    #[test]
    fn empty_word_list_is_rejected() {
        assert!(matches!(
            trim_to_speech(&ramp(10), &[]),
            Err(TrimError::EmptyTranscript)
        ));
    }

    #[test]
    fn clips_audio_and_rebases_words() {
        let clip = ramp(5_000);
        let words = vec![
            WordToken::new("hello", 1.0, 1.5),
            WordToken::new("there", 2.0, 3.25),
        ];
        let (trimmed, rebased) = trim_to_speech(&clip, &words).unwrap();
        assert_eq!(trimmed.len(), 2_250);
        assert_eq!(trimmed.samples[0], clip.samples[1_000]);
        assert_eq!(rebased[0], WordToken::new("hello", 0.0, 0.5));
        assert_eq!(rebased[1], WordToken::new("there", 1.0, 2.25));
    }

    #[test]
    fn trimming_trimmed_input_is_a_no_op() {
        let clip = ramp(5_000);
        let words = vec![
            WordToken::new("a", 0.0123, 0.4),
            WordToken::new("b", 0.9, 1.777),
        ];
        let (once_clip, once_words) = trim_to_speech(&clip, &words).unwrap();
        let (twice_clip, twice_words) = trim_to_speech(&once_clip, &once_words).unwrap();
        assert_eq!(once_clip, twice_clip);
        assert_eq!(once_words, twice_words);
    }

    #[test]
    fn words_past_the_buffer_are_clamped() {
        let clip = ramp(1_000);
        let words = vec![WordToken::new("late", 0.5, 4.0)];
        let (trimmed, _) = trim_to_speech(&clip, &words).unwrap();
        assert_eq!(trimmed.len(), 500);
    }

    #[test]
    fn artifact_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = TrimmedArtifact::write(dir.path(), &ramp(100)).unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("speech-trim-"));
        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn artifact_write_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = TrimmedArtifact::write(&missing, &ramp(10)).unwrap_err();
        assert!(matches!(err, TrimError::Artifact { .. }));
    }
}
