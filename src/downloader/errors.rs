// Error types for extractor backends

use std::io;
use thiserror::Error;

/// Failure reported by a [`MediaExtractor`](super::traits::MediaExtractor).
///
/// The worker never propagates these; it converts them into record state.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// yt-dlp (or another backend binary) is not installed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Process could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Tool ran and reported an error; the text is what it printed
    #[error("{0}")]
    Failed(String),

    /// Job was cancelled while the tool was running
    #[error("Download cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractorError {
    /// Raw text used for classification
    pub fn raw_message(&self) -> String {
        self.to_string()
    }
}
