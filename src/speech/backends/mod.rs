//! Synthesis backends

pub mod espeak;
