//! Error types for the channel simulator.

use thiserror::Error;

/// Result type for channel simulator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Audio device could not be opened or the stream could not start.
    #[error("audio device error: {0}")]
    Device(String),

    /// Invalid pipeline parameter.
    #[error("invalid parameter '{name}': {message}")]
    Config { name: &'static str, message: String },

    /// Input file has a shape the pipeline cannot run.
    #[error("unsupported input: {0}")]
    Input(String),

    /// Recorder worker is gone
    #[error("recorder error: {0}")]
    Recorder(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(name: &'static str, message: impl Into<String>) -> Self {
        Error::Config {
            name,
            message: message.into(),
        }
    }
}
