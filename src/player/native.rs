//! Native TTS playback backend using the tts crate
//!
//! Speaks text directly through the platform voice (Speech Dispatcher on
//! Linux, AVFoundation on macOS) without generating audio artifacts, so the
//! cache and the synthesis gateway are skipped for this target. Announcement
//! file references are still played through a local player subprocess when
//! one is available.

use crate::player::{local::LocalPlayer, PlaybackSource, Player};
use crate::{Result, SpeakdError};
use log::{debug, warn};
use tts::Tts as TtsCrate;

/// Speaking rate assumed for duration estimation, characters per second
const ESTIMATE_CHARS_PER_SEC: f64 = 15.0;

/// Native platform TTS backend
pub struct NativePlayer {
    /// The tts crate's TTS instance
    tts: TtsCrate,

    /// Artifact playback fallback for file references
    file_player: Option<LocalPlayer>,

    /// Last applied volume, to skip redundant backend calls
    volume: Option<u8>,
}

impl NativePlayer {
    /// Create a new native TTS player
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| SpeakdError::Playback(format!("Failed to initialize TTS: {}", e)))?;

        let file_player = match LocalPlayer::new() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("No artifact player for file references: {}", e);
                None
            }
        };

        Ok(Self {
            tts,
            file_player,
            volume: None,
        })
    }

    /// Convert volume (0-100) to the tts crate's 0.0-1.0 scale
    fn convert_volume(volume: u8) -> f32 {
        volume.min(100) as f32 / 100.0
    }

    /// Rough duration estimate for spoken text
    fn estimate_duration(text: &str) -> f64 {
        text.chars().count() as f64 / ESTIMATE_CHARS_PER_SEC
    }

    fn apply_volume(&mut self, volume: u8) -> Result<()> {
        if self.volume == Some(volume) {
            return Ok(());
        }
        self.volume = Some(volume);

        let features = self.tts.supported_features();
        if !features.volume {
            warn!("Volume control not supported on this platform");
            return Ok(());
        }

        self.tts
            .set_volume(Self::convert_volume(volume))
            .map_err(|e| SpeakdError::Playback(format!("Failed to set volume: {}", e)))?;
        Ok(())
    }
}

impl Player for NativePlayer {
    fn requires_artifact(&self) -> bool {
        false
    }

    fn supports_device_volume(&self) -> bool {
        // Volume only applies to the next utterance, not a live device
        false
    }

    fn play(&mut self, source: PlaybackSource, volume: u8) -> Result<f64> {
        match source {
            PlaybackSource::Text { text, language } => {
                if let Some(lang) = language {
                    debug!("Speaking ({}) {:?}", lang, text);
                } else {
                    debug!("Speaking {:?}", text);
                }
                self.apply_volume(volume)?;
                self.tts
                    .speak(text, false)
                    .map_err(|e| SpeakdError::Playback(format!("Speak failed: {}", e)))?;
                Ok(Self::estimate_duration(text))
            }
            PlaybackSource::Artifact(path) => match self.file_player.as_mut() {
                Some(player) => player.play(PlaybackSource::Artifact(path), volume),
                None => Err(SpeakdError::Playback(
                    "No artifact player available for file references".to_string(),
                )),
            },
        }
    }

    fn set_device_volume(&mut self, volume: u8) -> Result<()> {
        self.apply_volume(volume)
    }
}
