//! Audio backend error types

use thiserror::Error;

/// Errors raised while opening or running the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device available")]
    NoDevices,

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
