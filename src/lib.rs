//! speakd - text-to-speech playback daemon
//!
//! Turns text commands (or references to existing audio files) into spoken
//! audio on a configured playback device, with a persistent content-addressed
//! cache that avoids redundant synthesis calls.

pub mod audio;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod player;
pub mod request;
pub mod speech;

pub use error::{Result, SpeakdError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "speakd";
