//! Text-to-speech via an external engine.
//!
//! The engine reads text on stdin and writes encoded audio (WAV for vvtts)
//! to stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Command;
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::error::{excerpt, Result, SeqreadError};
use crate::process::{describe_failure, run_with_stdin};
use crate::stage::{AudioBuffer, PendingText, StageFuture, Synthesize};

const EXCERPT_CHARS: usize = 40;

pub struct CommandSynthesizer {
    inner: Arc<EngineCommand>,
}

struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            inner: Arc::new(EngineCommand {
                program: config.command.clone(),
                args: config.args.clone(),
            }),
        }
    }
}

impl EngineCommand {
    fn error(&self, text: &str, reason: impl Into<String>) -> SeqreadError {
        SeqreadError::Synthesis {
            text: excerpt(text, EXCERPT_CHARS),
            command: self.program.clone(),
            reason: reason.into(),
        }
    }

    async fn synthesize(&self, text: PendingText) -> Result<AudioBuffer> {
        let t0 = Instant::now();
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        let output = run_with_stdin(command, text.0.as_bytes())
            .await
            .map_err(|e| self.error(&text.0, e.to_string()))?;

        if !output.status.success() {
            return Err(self.error(&text.0, describe_failure(&output)));
        }
        if output.stdout.is_empty() {
            return Err(self.error(&text.0, "engine produced no audio"));
        }

        debug!(
            "Synthesized {} chars into {} bytes in {}ms",
            text.0.chars().count(),
            output.stdout.len(),
            t0.elapsed().as_millis()
        );
        Ok(AudioBuffer(output.stdout))
    }
}

impl Synthesize for CommandSynthesizer {
    fn synthesize(&self, text: PendingText) -> StageFuture<AudioBuffer> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.synthesize(text).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandSynthesizer {
        CommandSynthesizer::new(&SynthesisConfig {
            command: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
        })
    }

    #[tokio::test]
    async fn captures_stdout_as_audio() {
        let synth = shell("printf 'RIFF'; cat");
        let audio = synth.synthesize(PendingText("hello".into())).await.unwrap();
        assert_eq!(audio, AudioBuffer(b"RIFFhello".to_vec()));
    }

    #[tokio::test]
    async fn non_zero_exit_is_synthesis_error() {
        let synth = shell("cat >/dev/null; echo 'engine down' >&2; exit 2");
        let err = synth
            .synthesize(PendingText("hello".into()))
            .await
            .unwrap_err();
        match err {
            SeqreadError::Synthesis { text, command, reason } => {
                assert_eq!(text, "hello");
                assert_eq!(command, PathBuf::from("sh"));
                assert!(reason.contains("engine down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_output_is_synthesis_error() {
        let synth = shell("cat >/dev/null");
        assert!(matches!(
            synth.synthesize(PendingText("hello".into())).await,
            Err(SeqreadError::Synthesis { .. })
        ));
    }

    #[tokio::test]
    async fn missing_engine_is_synthesis_error() {
        let synth = CommandSynthesizer::new(&SynthesisConfig {
            command: PathBuf::from("/nonexistent/vvtts"),
            args: vec!["--stdout".into()],
        });
        assert!(matches!(
            synth.synthesize(PendingText("hello".into())).await,
            Err(SeqreadError::Synthesis { .. })
        ));
    }
}
