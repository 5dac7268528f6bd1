use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort an evaluation run
#[derive(Debug, Error)]
pub enum EvalError {
    /// Missing or unreadable inputs, invalid settings. Raised before inference starts.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A prompt placeholder whose backing sample attribute is absent or malformed
    #[error("Sample {sample}: placeholder {marker} needs field '{field}' but {reason}")]
    MissingField {
        sample: String,
        marker: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Audio error in {path:?}: {message}")]
    Audio { path: PathBuf, message: String },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
