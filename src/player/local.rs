//! Local playback backend
//!
//! Plays artifact files through the first available command line audio
//! player and applies device volume through PulseAudio when present.

use crate::audio;
use crate::player::{PlaybackSource, Player};
use crate::{Result, SpeakdError};
use log::{debug, error, warn};
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Player candidates in preference order
const PLAYERS: &[&str] = &["mpg123", "ffplay", "paplay", "aplay"];

/// Local audio player subprocess backend
pub struct LocalPlayer {
    /// Selected player binary
    player_bin: String,

    /// Currently running playback process
    current_process: Option<Child>,
}

impl LocalPlayer {
    /// Create a new local player
    ///
    /// Probes for an available audio player binary
    pub fn new() -> Result<Self> {
        let player_bin = Self::find_player()?;
        debug!("Found audio player: {}", player_bin);

        Ok(Self {
            player_bin,
            current_process: None,
        })
    }

    /// Find the first available audio player on PATH
    fn find_player() -> Result<String> {
        for candidate in PLAYERS {
            if let Ok(status) = Command::new(candidate)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(candidate.to_string());
                }
            }
        }

        Err(SpeakdError::Playback(format!(
            "No audio player found. Install one of: {}",
            PLAYERS.join(", ")
        )))
    }

    /// Reap a finished playback process, if any
    fn reap_process(&mut self) {
        if let Some(mut child) = self.current_process.take() {
            match child.try_wait() {
                Ok(Some(_)) | Err(_) => {}
                Ok(None) => {
                    // Still playing; playback runs to completion, there is
                    // no mid-playback cancellation.
                    self.current_process = Some(child);
                }
            }
        }
    }

    fn spawn_player(&mut self, path: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.player_bin);
        match self.player_bin.as_str() {
            "ffplay" => {
                cmd.arg("-autoexit").arg("-nodisp").arg(path);
            }
            _ => {
                cmd.arg(path);
            }
        }
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        match cmd.spawn() {
            Ok(child) => {
                self.current_process = Some(child);
                debug!("{} started for {}", self.player_bin, path.display());
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn {}: {}", self.player_bin, e);
                Err(SpeakdError::Playback(format!(
                    "Failed to start {}: {}",
                    self.player_bin, e
                )))
            }
        }
    }
}

impl Player for LocalPlayer {
    fn requires_artifact(&self) -> bool {
        true
    }

    fn supports_device_volume(&self) -> bool {
        true
    }

    fn play(&mut self, source: PlaybackSource, volume: u8) -> Result<f64> {
        let path = match source {
            PlaybackSource::Artifact(path) => path,
            PlaybackSource::Text { .. } => {
                return Err(SpeakdError::Playback(
                    "Local playback requires an audio artifact".to_string(),
                ));
            }
        };

        self.reap_process();
        self.set_device_volume(volume)?;

        let duration = audio::duration_of(path)?;
        self.spawn_player(path)?;
        Ok(duration)
    }

    fn set_device_volume(&mut self, volume: u8) -> Result<()> {
        debug!("Setting device volume to {}", volume);

        // Best effort through PulseAudio; absence of pactl is not an error
        let result = Command::new("pactl")
            .arg("set-sink-volume")
            .arg("@DEFAULT_SINK@")
            .arg(format!("{}%", volume.min(100)))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) if status.success() => {}
            Ok(_) => warn!("pactl refused to set volume"),
            Err(e) => debug!("pactl not available: {}", e),
        }
        Ok(())
    }
}

impl Drop for LocalPlayer {
    fn drop(&mut self) {
        // Let an in-flight playback finish on its own; just avoid zombies
        if let Some(mut child) = self.current_process.take() {
            let _ = child.try_wait();
        }
    }
}
