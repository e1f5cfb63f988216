use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Every decode strategy failed for the given input file.
    #[error("failed to decode audio {path:?}: {message}")]
    AudioDecode { path: PathBuf, message: String },

    /// A single decode or conditioning step failed. Recoverable while
    /// other decode strategies remain; otherwise folded into `AudioDecode`.
    #[error("audio processing error: {0}")]
    Audio(String),

    /// The forced-alignment backend rejected its input or crashed.
    /// Deterministic for identical input, so never retried.
    #[error("forced alignment backend failed: {0}")]
    AlignmentBackend(String),

    /// The recognition backend rejected its input or crashed.
    /// Deterministic for identical input, so never retried.
    #[error("recognition backend failed: {0}")]
    RecognitionBackend(String),

    #[error("failed to write output {path:?}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub(crate) fn audio_decode(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::AudioDecode {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}
