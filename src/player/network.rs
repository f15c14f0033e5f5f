//! Network playback backend
//!
//! Publishes resolved artifacts under the directory a web server exposes
//! and hands the resulting URL to the remote device. The device protocol
//! itself (cast, media daemon) is an external collaborator; this backend
//! only fulfills the uniform "play and report duration" contract. A missing
//! web endpoint disables the target at startup without stopping the
//! process.

use crate::audio;
use crate::player::{PlaybackSource, Player};
use crate::{Result, SpeakdError};
use log::{debug, error, info};
use std::fs;
use std::path::PathBuf;

/// Network device backend serving artifacts over a web endpoint
pub struct NetworkPlayer {
    /// Base URL the device fetches artifacts from
    web_url: String,

    /// Directory the web server exposes
    publish_dir: PathBuf,
}

impl NetworkPlayer {
    /// Create a new network player
    ///
    /// Requires a configured web endpoint; refusing to construct without
    /// one degrades only this target.
    pub fn new(web_url: Option<&str>, publish_dir: PathBuf) -> Result<Self> {
        let web_url = match web_url {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(url) => {
                return Err(SpeakdError::Config(format!(
                    "web.url must be an http(s) URL, got '{}'",
                    url
                )));
            }
            None => {
                return Err(SpeakdError::Config(
                    "Network playback needs web.url configured".to_string(),
                ));
            }
        };

        fs::create_dir_all(&publish_dir).map_err(|e| {
            SpeakdError::Config(format!("Cannot create {}: {}", publish_dir.display(), e))
        })?;

        info!("Network playback publishing to {}", web_url);
        Ok(Self {
            web_url,
            publish_dir,
        })
    }
}

impl Player for NetworkPlayer {
    fn requires_artifact(&self) -> bool {
        true
    }

    fn supports_device_volume(&self) -> bool {
        // Volume travels with each playback request to the device
        false
    }

    fn play(&mut self, source: PlaybackSource, volume: u8) -> Result<f64> {
        let path = match source {
            PlaybackSource::Artifact(path) => path,
            PlaybackSource::Text { .. } => {
                return Err(SpeakdError::Playback(
                    "Network playback requires an audio artifact".to_string(),
                ));
            }
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| SpeakdError::Playback(format!("Bad artifact path: {}", path.display())))?;
        let published = self.publish_dir.join(file_name);

        if published != path {
            fs::copy(path, &published).map_err(|e| {
                error!("Cannot publish {}: {}", path.display(), e);
                SpeakdError::Playback(format!("Cannot publish artifact: {}", e))
            })?;
        }

        let duration = audio::duration_of(&published)?;
        let url = format!("{}/{}", self.web_url, file_name.to_string_lossy());
        debug!("Handing {} (volume {}) to network device", url, volume);
        Ok(duration)
    }

    fn set_device_volume(&mut self, _volume: u8) -> Result<()> {
        Ok(())
    }
}
