use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by seqread.
#[derive(Debug, Error)]
pub enum SeqreadError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("synthesis failed for \"{text}\" ({}): {reason}", .command.display())]
    Synthesis {
        text: String,
        command: PathBuf,
        reason: String,
    },

    #[error("playback failed ({command}): {reason}")]
    Playback { command: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{stage} worker exited without reporting a result")]
    WorkerLost { stage: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SeqreadError>;

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
