//! Speech synthesis abstraction
//!
//! Provides a unified interface to the configured synthesis backend. The
//! playback queue and the pre-cache worker both go through this trait; the
//! single-threaded driver guarantees at most one call per slot in flight.

use crate::{Result, SpeakdError};
use log::info;
use std::path::PathBuf;

/// Speech synthesis engine
///
/// Converts text plus an optional language into an audio artifact on disk
/// and its duration in seconds. Failures are reported as values, never as
/// process-fatal conditions.
pub trait SpeechEngine: Send {
    /// Engine identity string; a change of identity invalidates the cache
    fn id(&self) -> &str;

    /// Synthesize text into an audio file, returning its path and duration
    fn synthesize(&mut self, text: &str, language: Option<&str>) -> Result<(PathBuf, f64)>;
}

/// Create the synthesis engine selected by `engine_id`
///
/// Currently `espeak-ng` (and any `espeak*` identifier) is backed by the
/// espeak-ng subprocess backend. Unknown identifiers are a configuration
/// error; callers degrade rather than abort.
pub fn create_engine(engine_id: &str) -> Result<Box<dyn SpeechEngine>> {
    if engine_id.starts_with("espeak") {
        info!("Creating espeak-ng synthesis backend (engine id '{}')", engine_id);
        let engine = backends_espeak(engine_id)?;
        return Ok(engine);
    }

    Err(SpeakdError::Config(format!(
        "Unknown synthesis engine '{}'. Supported: espeak-ng",
        engine_id
    )))
}

fn backends_espeak(engine_id: &str) -> Result<Box<dyn SpeechEngine>> {
    use super::backends::espeak::EspeakEngine;
    let engine = EspeakEngine::new(engine_id)?;
    Ok(Box::new(engine))
}

/// Stand-in engine used when the configured backend failed to initialize
///
/// Keeps the engine identity (so cache invalidation still sees the
/// configured id) while every synthesis call reports the startup failure.
/// Items degrade to duration 0 instead of stopping the process.
pub struct UnavailableEngine {
    id: String,
    reason: String,
}

impl UnavailableEngine {
    pub fn new(engine_id: &str, reason: String) -> Self {
        Self {
            id: engine_id.to_string(),
            reason,
        }
    }
}

impl SpeechEngine for UnavailableEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn synthesize(&mut self, _text: &str, _language: Option<&str>) -> Result<(PathBuf, f64)> {
        Err(SpeakdError::Synthesis(format!(
            "Synthesis backend unavailable: {}",
            self.reason
        )))
    }
}
