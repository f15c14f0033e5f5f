//! espeak-ng synthesis backend
//!
//! Spawns espeak-ng to render text into a WAV file in the temp directory
//! and inspects the result for its duration. This is the artifact-producing
//! backend behind the `espeak-ng` engine identity.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)

use crate::audio;
use crate::speech::SpeechEngine;
use crate::{Result, SpeakdError};
use log::{debug, error};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique artifact file names within the process
static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// espeak-ng subprocess backend
pub struct EspeakEngine {
    /// Engine identity as configured (drives cache invalidation)
    id: String,

    /// Path to espeak-ng
    espeak_path: String,
}

impl EspeakEngine {
    /// Create a new espeak-ng backend
    ///
    /// Verifies espeak-ng is available before accepting any work
    pub fn new(engine_id: &str) -> Result<Self> {
        debug!("Creating espeak-ng backend");
        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            id: engine_id.to_string(),
            espeak_path,
        })
    }

    /// Find espeak-ng executable
    fn find_espeak() -> Result<String> {
        let paths = vec!["espeak-ng", "/usr/bin/espeak-ng", "espeak"];

        for path in paths {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(SpeakdError::Synthesis(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Allocate a unique output path in the temp directory
    fn artifact_path() -> PathBuf {
        let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("speakd_{}_{}.wav", std::process::id(), seq))
    }
}

impl SpeechEngine for EspeakEngine {
    fn id(&self) -> &str {
        &self.id
    }

    fn synthesize(&mut self, text: &str, language: Option<&str>) -> Result<(PathBuf, f64)> {
        if text.is_empty() {
            return Err(SpeakdError::Synthesis("empty text".to_string()));
        }

        let out_path = Self::artifact_path();
        let voice = language.unwrap_or("en");

        debug!("Synthesizing {:?} (voice {}) -> {}", text, voice, out_path.display());

        let mut cmd = Command::new(&self.espeak_path);
        cmd.arg("-v").arg(voice);
        cmd.arg("-w").arg(&out_path);
        cmd.arg(text);
        cmd.stdout(Stdio::null());

        let output = cmd
            .output()
            .map_err(|e| SpeakdError::Synthesis(format!("Failed to run espeak-ng: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("espeak-ng failed: {}", stderr);
            return Err(SpeakdError::Synthesis(format!(
                "espeak-ng failed: {}",
                stderr
            )));
        }

        let duration = audio::duration_of(&out_path)
            .map_err(|e| SpeakdError::Synthesis(format!("Unreadable artifact: {}", e)))?;

        Ok((out_path, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths_are_unique() {
        let a = EspeakEngine::artifact_path();
        let b = EspeakEngine::artifact_path();
        assert_ne!(a, b);
    }

    #[test]
    fn test_create_espeak_engine() {
        match EspeakEngine::new("espeak-ng") {
            Ok(engine) => {
                assert_eq!(engine.id(), "espeak-ng");
                println!("✓ espeak-ng backend available");
            }
            Err(e) => println!("⚠ espeak-ng backend not available: {}", e),
        }
    }
}
