//! Content-addressed audio cache
//!
//! Maps a (language, text) pair to a stored artifact via a deterministic
//! SHA-256 key. The cache is write-once per key: repeated stores never
//! rewrite an existing artifact. A persisted engine marker (`engine.txt`)
//! records which synthesis engine populated the store; when the configured
//! engine changes, every artifact is purged wholesale before the marker is
//! rewritten. Individual entries are never removed.

use crate::{Result, SpeakdError};
use log::{debug, error, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the persisted engine marker inside the cache root
const ENGINE_MARKER: &str = "engine.txt";

/// Content-addressed cache over a directory of audio artifacts
pub struct Cache {
    /// Cache root directory (sanitized, confined to the application root)
    root: PathBuf,

    /// When false, lookups always miss and stores are no-ops
    enabled: bool,
}

impl Cache {
    pub fn new(root: PathBuf, enabled: bool) -> Self {
        Self { root, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the cache key for synthesized text
    ///
    /// The key covers `language ++ ";" ++ text` with an absent language
    /// normalized to the empty string, so both channels derive identical
    /// keys for the same command.
    fn key(language: Option<&str>, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(language.unwrap_or("").as_bytes());
        hasher.update(b";");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// File references are keyed on the raw path text alone; language and
    /// volume have no bearing on the referenced bytes.
    fn file_ref_key(path_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path_text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn artifact_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.mp3", key))
    }

    /// Look up a synthesized artifact; existence of the file is the hit
    /// signal. A disabled cache always misses.
    pub fn lookup(&self, language: Option<&str>, text: &str) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = self.artifact_path(&Self::key(language, text));
        if path.exists() {
            debug!("Cache hit: {}", path.display());
            Some(path)
        } else {
            None
        }
    }

    /// Look up a mirrored file reference
    pub fn lookup_file_ref(&self, path_text: &str) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = self.artifact_path(&Self::file_ref_key(path_text));
        path.exists().then_some(path)
    }

    /// Store a synthesized artifact, write-once per key
    ///
    /// Returns the artifact path, or `None` when caching is disabled. An
    /// existing artifact is never rewritten; the same key always carries
    /// identical bytes, so concurrent stores are safe without locking.
    pub fn store(&self, language: Option<&str>, text: &str, bytes: &[u8]) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        self.write_once(self.artifact_path(&Self::key(language, text)), bytes)
            .map(Some)
    }

    /// Mirror resolved file-reference bytes into the cache path computed
    /// for the reference. Never uses the synthesis key scheme.
    pub fn store_file_ref(&self, path_text: &str, bytes: &[u8]) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        self.write_once(self.artifact_path(&Self::file_ref_key(path_text)), bytes)
            .map(Some)
    }

    fn write_once(&self, path: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
        if path.exists() {
            debug!("Artifact already cached: {}", path.display());
            return Ok(path);
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| SpeakdError::Cache(format!("Cannot create {}: {}", self.root.display(), e)))?;
        fs::write(&path, bytes)
            .map_err(|e| SpeakdError::Cache(format!("Cannot write {}: {}", path.display(), e)))?;
        debug!("Cached artifact: {}", path.display());
        Ok(path)
    }

    /// Engine-change invalidation barrier
    ///
    /// Runs once at startup, before any lookup or store is trusted. An
    /// absent marker counts as matching (first run) and is written; a
    /// mismatching marker purges every artifact and is then rewritten.
    pub fn invalidate_if_engine_changed(&self, engine_id: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| SpeakdError::Cache(format!("Cannot create {}: {}", self.root.display(), e)))?;

        let marker = self.root.join(ENGINE_MARKER);
        let previous = match fs::read_to_string(&marker) {
            Ok(s) => Some(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                error!("Cannot read {}: {}", marker.display(), e);
                None
            }
        };

        match previous {
            Some(prev) if prev == engine_id => {
                debug!("Cache populated by current engine: {}", engine_id);
                return Ok(());
            }
            Some(prev) => {
                warn!(
                    "Synthesis engine changed ({} -> {}), purging cache",
                    prev, engine_id
                );
                self.purge_artifacts()?;
            }
            None => {
                debug!("No engine marker, first cache population");
            }
        }

        fs::write(&marker, engine_id)
            .map_err(|e| SpeakdError::Cache(format!("Cannot write {}: {}", marker.display(), e)))
    }

    /// Delete every stored artifact, keeping the cache root itself
    fn purge_artifacts(&self) -> Result<()> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| SpeakdError::Cache(format!("Cannot read {}: {}", self.root.display(), e)))?;
        let mut purged = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.file_name().map(|n| n == ENGINE_MARKER).unwrap_or(false) {
                continue;
            }
            if path.is_file() {
                if let Err(e) = fs::remove_file(&path) {
                    error!("Cannot remove {}: {}", path.display(), e);
                } else {
                    purged += 1;
                }
            }
        }
        debug!("Purged {} cached artifacts", purged);
        Ok(())
    }
}

/// Sanitize a configured cache directory into a path confined under the
/// application root
///
/// A leading separator is stripped and every `..` segment collapses the
/// segment before it instead of escaping upward; a `..` with nothing before
/// it is dropped. Caller-supplied relative segments are never trusted.
pub fn sanitize_cache_dir(app_root: &Path, configured: &str) -> PathBuf {
    let normalized = configured.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/').trim_end_matches('/');

    let mut segments: Vec<&str> = Vec::new();
    for part in trimmed.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut path = app_root.to_path_buf();
    for seg in segments {
        path.push(seg);
    }
    path
}
