use crate::compiler::CompilationError;

/// Result alias that carries the custom [`BeatlineError`] type.
pub type Result<T> = std::result::Result<T, BeatlineError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatlineError {
    /// The beat map could not be turned into a timeline.
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    /// A track or sample request came back with a non-success status.
    #[error("failed to fetch audio at {url}: status {status}")]
    Fetch { url: String, status: u16 },
    /// The fetched payload is not a playable sample.
    #[error("failed to decode audio at {url}: {reason}")]
    Decode { url: String, reason: String },
    /// The underlying audio engine refused an operation.
    #[error("audio backend error: {0}")]
    Backend(String),
    #[error("audio is not initialized yet")]
    NotInitialized,
    #[error("note type is not registered: {0}")]
    UnknownNoteType(usize),
    #[error("volume controls already connected")]
    VolumeAlreadyConnected,
    /// A builder was finished without one of its required fields.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BeatlineError {
    /// Creates a backend error from anything printable.
    pub fn backend<T: Into<String>>(msg: T) -> Self {
        Self::Backend(msg.into())
    }
}
