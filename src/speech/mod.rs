//! Speech synthesis gateway
//!
//! Wraps the pluggable synthesis backend behind a uniform synchronous-result
//! contract used by both the playback path and the background pre-cache
//! path.

pub mod backends;
pub mod synth;

pub use synth::{create_engine, SpeechEngine};
