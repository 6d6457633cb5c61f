use thiserror::Error;

/// Errors surfaced by track handling and configuration.
///
/// Provider failures are not represented here: they degrade a single gap to
/// unfilled and are reported through [`crate::types::FillFailure`].
#[derive(Error, Debug)]
pub enum GapFillError {
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Track already finished")]
    TrackFinished,

    #[error("Track still recording: {0}")]
    TrackNotFinished(String),

    #[error("Track has no samples")]
    EmptyTrack,

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GapFillError>;
