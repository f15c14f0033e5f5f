//! Managed media store
//!
//! Pre-shipped announcement and prompt audio ships in a bundled media
//! directory; at startup those files are mirrored into the daemon's managed
//! store if not already present there. The store also carries the optional
//! pre-cache manifest, a JSON list of raw commands submitted to the
//! background worker once on startup.

use crate::{Result, SpeakdError};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the pre-cache manifest inside the bundled media directory
const PRECACHE_MANIFEST: &str = "precache.json";

/// Pre-cache manifest: raw commands fed to the background worker at startup
#[derive(Debug, Deserialize)]
pub struct PrecacheManifest {
    /// Raw commands, decoded with the same rules as live commands
    pub commands: Vec<String>,
}

/// Mirror bundled media files into the managed store
///
/// Existing store files are never overwritten. A missing bundled directory
/// is fine (nothing shipped); store creation failures degrade media-backed
/// features only.
pub fn sync(bundled: &Path, store: &Path) -> Result<usize> {
    if !bundled.exists() {
        debug!("No bundled media at {}", bundled.display());
        return Ok(0);
    }

    fs::create_dir_all(store)
        .map_err(|e| SpeakdError::Config(format!("Cannot create {}: {}", store.display(), e)))?;

    let mut mirrored = 0usize;
    for entry in fs::read_dir(bundled)
        .map_err(|e| SpeakdError::Config(format!("Cannot read {}: {}", bundled.display(), e)))?
        .flatten()
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        if name == PRECACHE_MANIFEST {
            continue;
        }

        let target = store.join(name);
        if target.exists() {
            continue;
        }
        match fs::copy(&path, &target) {
            Ok(_) => {
                debug!("Mirrored {} into store", path.display());
                mirrored += 1;
            }
            Err(e) => warn!("Cannot mirror {}: {}", path.display(), e),
        }
    }

    info!("Media store synced, {} new files", mirrored);
    Ok(mirrored)
}

/// Resolve a configured announcement file inside the managed store
///
/// Returns `None` (announcements disabled) with a warning when the file is
/// missing.
pub fn resolve_announce(store: &Path, file: &str) -> Option<PathBuf> {
    let path = store.join(file);
    if path.exists() {
        Some(path)
    } else {
        warn!(
            "Announcement file {} not found, announcements disabled",
            path.display()
        );
        None
    }
}

/// Load the pre-cache manifest from the bundled media directory, if present
pub fn load_precache_manifest(bundled: &Path) -> Result<Option<PrecacheManifest>> {
    let path = bundled.join(PRECACHE_MANIFEST);
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)?;
    let manifest: PrecacheManifest = serde_json::from_str(&contents)?;
    info!(
        "Loaded pre-cache manifest with {} commands",
        manifest.commands.len()
    );
    Ok(Some(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_copies_missing_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = dir.path().join("media");
        let store = dir.path().join("store");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("ding.mp3"), b"ding").unwrap();
        fs::write(bundled.join("dong.mp3"), b"dong").unwrap();

        assert_eq!(sync(&bundled, &store).unwrap(), 2);
        assert!(store.join("ding.mp3").exists());

        // Second sync finds everything in place
        assert_eq!(sync(&bundled, &store).unwrap(), 0);
    }

    #[test]
    fn test_sync_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = dir.path().join("media");
        let store = dir.path().join("store");
        fs::create_dir_all(&bundled).unwrap();
        fs::create_dir_all(&store).unwrap();
        fs::write(bundled.join("ding.mp3"), b"new").unwrap();
        fs::write(store.join("ding.mp3"), b"old").unwrap();

        sync(&bundled, &store).unwrap();
        assert_eq!(fs::read(store.join("ding.mp3")).unwrap(), b"old");
    }

    #[test]
    fn test_missing_bundle_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            sync(&dir.path().join("none"), &dir.path().join("store")).unwrap(),
            0
        );
    }

    #[test]
    fn test_manifest_loading() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("precache.json"),
            r#"{"commands": ["en;Hello", "7;de;Hallo"]}"#,
        )
        .unwrap();

        let manifest = load_precache_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(manifest.commands.len(), 2);
        assert_eq!(manifest.commands[0], "en;Hello");
    }

    #[test]
    fn test_absent_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_precache_manifest(dir.path()).unwrap().is_none());
    }
}
