//! Playback device boundary
//!
//! The core hands a resolved audio artifact (or raw text, for targets that
//! speak natively) plus a volume to a `Player` and gets back the elapsed
//! duration. Device specifics stay behind this trait.

pub mod local;
pub mod native;
pub mod network;

use crate::{Result, SpeakdError};
use log::info;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Selected playback device backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTarget {
    /// Local audio player subprocess, plays artifact files
    Local,
    /// Platform TTS voice, speaks text directly without artifacts
    Native,
    /// Network device fed artifact URLs through the web endpoint
    Network,
}

impl FromStr for DeviceTarget {
    type Err = SpeakdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(DeviceTarget::Local),
            "native" => Ok(DeviceTarget::Native),
            "network" => Ok(DeviceTarget::Network),
            other => Err(SpeakdError::Config(format!(
                "Unknown device target '{}'",
                other
            ))),
        }
    }
}

/// What the queue resolved for playback
#[derive(Debug)]
pub enum PlaybackSource<'a> {
    /// A resolved audio artifact on disk
    Artifact(&'a Path),
    /// Raw text for targets that need no artifact
    Text {
        text: &'a str,
        language: Option<&'a str>,
    },
}

/// Playback device
///
/// Implementations start playback and report the expected elapsed duration
/// in seconds; the queue schedules its advance from that report.
pub trait Player: Send {
    /// Does this target need a synthesized audio artifact?
    ///
    /// Targets that speak text natively skip artifact generation and the
    /// cache entirely.
    fn requires_artifact(&self) -> bool;

    /// Can a volume be applied to a live device right now?
    ///
    /// When false, a "set volume" request is remembered as the default for
    /// subsequent utterances instead.
    fn supports_device_volume(&self) -> bool;

    /// Play the resolved source at the given volume (0-100), returning the
    /// duration in seconds
    fn play(&mut self, source: PlaybackSource, volume: u8) -> Result<f64>;

    /// Apply a volume to the live device
    fn set_device_volume(&mut self, volume: u8) -> Result<()>;
}

/// Everything backend construction may need from the environment
pub struct PlayerContext {
    /// Application root; the network target publishes under it
    pub app_root: PathBuf,
    /// Web endpoint base URL for network targets
    pub web_url: Option<String>,
}

/// Create the playback backend for the configured target
///
/// A misconfigured target (e.g. network without a web endpoint) is a
/// configuration error; the caller degrades the dependent feature instead
/// of stopping the process.
pub fn create_player(target: DeviceTarget, ctx: &PlayerContext) -> Result<Box<dyn Player>> {
    match target {
        DeviceTarget::Local => {
            info!("Creating local playback backend");
            Ok(Box::new(local::LocalPlayer::new()?))
        }
        DeviceTarget::Native => {
            info!("Creating native TTS playback backend");
            Ok(Box::new(native::NativePlayer::new()?))
        }
        DeviceTarget::Network => {
            info!("Creating network playback backend");
            Ok(Box::new(network::NetworkPlayer::new(
                ctx.web_url.as_deref(),
                ctx.app_root.join("www"),
            )?))
        }
    }
}
