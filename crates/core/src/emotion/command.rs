use crate::emotion::{EmotionClassifier, EmotionError, EmotionInput, ToneScore};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::process::Stdio;
use tokio::process::Command;

/// Runs an external classifier as `<program> [args..] <artifact.wav>` and
/// reads `{"label": .., "scores": {..}}` from its stdout.
#[derive(Clone, Debug)]
pub struct CommandEmotionClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandEmotionClassifier {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Splits a command line on whitespace; `None` when it is blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn parse_output(stdout: &[u8]) -> Result<ToneScore, EmotionError> {
        let tone: ToneScore = serde_json::from_slice(stdout)
            .map_err(|e| EmotionError::InvalidOutput(e.to_string()))?;
        if tone.label.trim().is_empty() {
            return Err(EmotionError::InvalidOutput("empty label".into()));
        }
        Ok(tone)
    }
}

impl EmotionClassifier for CommandEmotionClassifier {
    fn classify<'a>(
        &'a self,
        input: &'a EmotionInput,
    ) -> BoxFuture<'a, Result<ToneScore, EmotionError>> {
        async move {
            tracing::debug!(
                program = %self.program,
                artifact = %input.artifact_path.display(),
                "running emotion classifier"
            );
            let output = Command::new(&self.program)
                .args(&self.args)
                .arg(&input.artifact_path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| EmotionError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(EmotionError::Failed {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                });
            }
            Self::parse_output(&output.stdout)
        }
        .boxed()
    }
}
