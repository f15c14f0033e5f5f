//! Error types for speakd

use std::io;
use thiserror::Error;

/// Main error type for speakd
///
/// Every variant is recovered at the component boundary that detects it;
/// none of these terminate the process.
#[derive(Error, Debug)]
pub enum SpeakdError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for speakd operations
pub type Result<T> = std::result::Result<T, SpeakdError>;

impl From<String> for SpeakdError {
    fn from(s: String) -> Self {
        SpeakdError::Other(s)
    }
}

impl From<&str> for SpeakdError {
    fn from(s: &str) -> Self {
        SpeakdError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for SpeakdError {
    fn from(e: serde_json::Error) -> Self {
        SpeakdError::Config(format!("JSON error: {}", e))
    }
}
