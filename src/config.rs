//! Configuration management
//!
//! Settings live in an INI file (`~/.speakd.cfg` by default) covering the
//! cache, the synthesis engine identity, announcements, the playback device
//! target and the web endpoint for network targets. Unrecognized or invalid
//! values fall back to their defaults.

use crate::player::DeviceTarget;
use crate::{Result, SpeakdError};
use ini::Ini;
use log::{debug, info, warn};
use std::path::PathBuf;

/// Application configuration for the playback daemon
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path
    path: PathBuf,
}

impl Config {
    /// Load configuration from disk or create default
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from an explicit path, writing defaults when the
    /// file does not exist yet
    pub fn load_from(path: PathBuf) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| SpeakdError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| SpeakdError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| SpeakdError::Config(format!("Failed to save config: {}", e)))
    }

    /// Default config file path (~/.speakd.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".speakd.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("cache"))
            .set("enabled", "false")
            .set("dir", "cache");

        ini.with_section(Some("engine")).set("id", "espeak-ng");

        ini.with_section(Some("announce"))
            .set("file", "")
            .set("timeout", "15")
            .set("volume_percent", "70");

        ini.with_section(Some("device"))
            .set("target", "local")
            .set("volume", "70");

        ini.with_section(Some("web")).set("url", "");

        ini.with_section(Some("media")).set("dir", "media");

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an integer value from config
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    // Daemon-specific configuration getters

    /// Is the artifact cache enabled?
    pub fn cache_enabled(&self) -> bool {
        self.get_bool("cache", "enabled", false)
    }

    /// Configured cache directory, relative to the application root;
    /// passes through the sanitizer before use
    pub fn cache_dir(&self) -> String {
        self.get_string("cache", "dir", "cache")
    }

    /// Identity of the synthesis engine; drives cache invalidation
    pub fn engine_id(&self) -> String {
        self.get_string("engine", "id", "espeak-ng")
    }

    /// Announcement audio file (inside the media store), empty disables
    /// announcements
    pub fn announce_file(&self) -> Option<String> {
        let file = self.get_string("announce", "file", "");
        if file.is_empty() {
            None
        } else {
            Some(file)
        }
    }

    /// Idle seconds after which a new utterance is preceded by the
    /// announcement
    pub fn announce_timeout_secs(&self) -> u64 {
        let v = self.get_int("announce", "timeout", 15);
        if v < 0 {
            warn!("announce.timeout must be >= 0, using default");
            15
        } else {
            v as u64
        }
    }

    /// Percent of the requested volume the announcement plays at
    pub fn announce_volume_percent(&self) -> u8 {
        let v = self.get_int("announce", "volume_percent", 70);
        if (0..=100).contains(&v) {
            v as u8
        } else {
            warn!("announce.volume_percent must be 0-100, using default");
            70
        }
    }

    /// Selected playback device target
    pub fn device_target(&self) -> DeviceTarget {
        let raw = self.get_string("device", "target", "local");
        match raw.parse() {
            Ok(target) => target,
            Err(_) => {
                warn!("Unknown device.target '{}', using local", raw);
                DeviceTarget::Local
            }
        }
    }

    /// Default playback volume (0-100) used when a command carries none
    pub fn default_volume(&self) -> u8 {
        let v = self.get_int("device", "volume", 70);
        if (0..=100).contains(&v) {
            v as u8
        } else {
            warn!("device.volume must be 0-100, using default");
            70
        }
    }

    /// Web endpoint base URL, required for the network device target
    pub fn web_url(&self) -> Option<String> {
        let url = self.get_string("web", "url", "");
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }

    /// Directory of pre-shipped media (announcements, prompts) mirrored
    /// into the managed store at startup
    pub fn media_dir(&self) -> String {
        self.get_string("media", "dir", "media")
    }
}
