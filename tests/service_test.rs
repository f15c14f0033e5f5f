//! Queue manager integration tests
//!
//! Drives a `Service` with scripted synthesis and playback backends through
//! `handle_command` and `poll`, checking ordering, announcement preemption,
//! pre-cache throttling and failure degradation without touching real audio
//! devices.

use speakd::cache::Cache;
use speakd::engine::queue::AnnounceSettings;
use speakd::engine::{Command, Service, ServiceSettings};
use speakd::player::{PlaybackSource, Player};
use speakd::speech::SpeechEngine;
use speakd::{Result, SpeakdError};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Synthesis backend that writes small real files and records every call
struct ScriptedEngine {
    dir: PathBuf,
    seq: usize,
    calls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl SpeechEngine for ScriptedEngine {
    fn id(&self) -> &str {
        "scripted"
    }

    fn synthesize(&mut self, text: &str, _language: Option<&str>) -> Result<(PathBuf, f64)> {
        if self.fail {
            return Err(SpeakdError::Synthesis("scripted failure".to_string()));
        }
        self.calls.lock().unwrap().push(text.to_string());
        self.seq += 1;
        let path = self.dir.join(format!("synth-{}.mp3", self.seq));
        fs::write(&path, b"synthesized bytes")?;
        Ok((path, 1.0))
    }
}

/// Playback backend that records (source, volume) pairs and reports a fixed
/// duration
struct RecordingPlayer {
    calls: Arc<Mutex<Vec<(String, u8)>>>,
    duration: f64,
}

impl Player for RecordingPlayer {
    fn requires_artifact(&self) -> bool {
        true
    }

    fn supports_device_volume(&self) -> bool {
        false
    }

    fn play(&mut self, source: PlaybackSource, volume: u8) -> Result<f64> {
        let what = match source {
            PlaybackSource::Artifact(path) => path.display().to_string(),
            PlaybackSource::Text { text, .. } => text.to_string(),
        };
        self.calls.lock().unwrap().push((what, volume));
        Ok(self.duration)
    }

    fn set_device_volume(&mut self, _volume: u8) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    service: Service,
    played: Arc<Mutex<Vec<(String, u8)>>>,
    synthesized: Arc<Mutex<Vec<String>>>,
    cache_root: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(cache_enabled: bool, announce: Option<AnnounceSettings>, fail_synth: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let played = Arc::new(Mutex::new(Vec::new()));
    let synthesized = Arc::new(Mutex::new(Vec::new()));

    let engine = ScriptedEngine {
        dir: dir.path().to_path_buf(),
        seq: 0,
        calls: Arc::clone(&synthesized),
        fail: fail_synth,
    };
    let player = RecordingPlayer {
        calls: Arc::clone(&played),
        duration: 1.0,
    };

    let service = Service::new(
        Cache::new(cache_root.clone(), cache_enabled),
        Box::new(engine),
        Box::new(player),
        ServiceSettings {
            default_volume: 70,
            announce,
        },
    );

    Harness {
        service,
        played,
        synthesized,
        cache_root,
        _dir: dir,
    }
}

fn cached_artifacts(root: &PathBuf) -> usize {
    fs::read_dir(root)
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.path().extension().map(|x| x == "mp3").unwrap_or(false))
                .count()
        })
        .unwrap_or(0)
}

#[test]
fn test_say_plays_at_default_volume() {
    let mut h = harness(false, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::Say("Hello".to_string()), now);
    let deadline = h.service.poll(now);

    let played = h.played.lock().unwrap();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].1, 70);
    assert!(deadline.is_some());
}

#[test]
fn test_queue_advances_after_completion() {
    let mut h = harness(false, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::Say("one".to_string()), now);
    h.service.handle_command(Command::Say("two".to_string()), now);
    assert_eq!(h.service.queue_len(), 2);

    let first_done = h.service.poll(now).unwrap();
    assert_eq!(h.played.lock().unwrap().len(), 1);

    let second_done = h.service.poll(first_done).unwrap();
    assert_eq!(h.played.lock().unwrap().len(), 2);
    assert_eq!(h.service.queue_len(), 1);

    h.service.poll(second_done);
    assert_eq!(h.service.queue_len(), 0);
    assert!(h.service.is_idle());
}

#[test]
fn test_rapid_duplicate_say_is_dropped() {
    let mut h = harness(false, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::Say("Hello".to_string()), now);
    h.service.handle_command(Command::Say("Hello".to_string()), now);
    assert_eq!(h.service.queue_len(), 1);
}

#[test]
fn test_set_volume_applies_to_later_utterances() {
    let mut h = harness(false, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::SetVolume(30), now);
    h.service.handle_command(Command::Say("Hello".to_string()), now);
    h.service.poll(now);

    assert_eq!(h.played.lock().unwrap()[0].1, 30);
}

#[test]
fn test_announcement_precedes_and_is_scaled() {
    let dir = tempfile::tempdir().unwrap();
    let ding = dir.path().join("ding.mp3");
    fs::write(&ding, b"ding bytes").unwrap();

    let mut h = harness(
        false,
        Some(AnnounceSettings {
            file: ding.clone(),
            idle_timeout: Duration::from_secs(15),
            volume_percent: 50,
        }),
        false,
    );
    let now = Instant::now();

    h.service.handle_command(Command::Say("80;Hello".to_string()), now);
    assert_eq!(h.service.queue_len(), 2);

    let announce_done = h.service.poll(now).unwrap();
    {
        let played = h.played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert!(played[0].0.ends_with("ding.mp3"));
        // Half the requested volume at 50 percent scale
        assert_eq!(played[0].1, 40);
    }

    h.service.poll(announce_done);
    let played = h.played.lock().unwrap();
    assert_eq!(played.len(), 2);
    assert_eq!(played[1].1, 80);
    // The utterance itself went through synthesis, the announcement did not
    assert_eq!(h.synthesized.lock().unwrap().as_slice(), ["Hello"]);
}

#[test]
fn test_precache_generates_with_cooldown() {
    let mut h = harness(true, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::CacheText("one".to_string()), now);
    h.service.handle_command(Command::CacheText("two".to_string()), now);

    // The first generation ran immediately, the second waits out the
    // cooldown
    assert_eq!(h.synthesized.lock().unwrap().len(), 1);
    assert_eq!(h.service.precache_pending(), 1);

    let resume = h.service.poll(now).unwrap();
    assert!(resume > now + Duration::from_secs(1));
    assert_eq!(h.synthesized.lock().unwrap().len(), 1);

    h.service.poll(resume);
    assert_eq!(h.synthesized.lock().unwrap().as_slice(), ["one", "two"]);
    assert_eq!(cached_artifacts(&h.cache_root), 2);
    assert_eq!(h.played.lock().unwrap().len(), 0);
}

#[test]
fn test_precache_hit_skips_synthesis_and_cooldown() {
    let mut h = harness(true, None, false);
    let now = Instant::now();

    // Warm the cache through playback first
    h.service.handle_command(Command::Say("Hello".to_string()), now);
    let done = h.service.poll(now).unwrap();
    h.service.poll(done);
    assert_eq!(h.synthesized.lock().unwrap().len(), 1);

    h.service.handle_command(Command::CacheText("Hello".to_string()), done);

    // Already cached: no second synthesis and no cooldown deadline
    assert_eq!(h.synthesized.lock().unwrap().len(), 1);
    assert!(h.service.poll(done).is_none());
    assert!(h.service.is_idle());
}

#[test]
fn test_precache_rejects_file_reference() {
    let mut h = harness(true, None, false);
    let now = Instant::now();

    h.service
        .handle_command(Command::CacheText("/media/bell.mp3".to_string()), now);

    assert_eq!(h.service.precache_pending(), 0);
    assert_eq!(h.synthesized.lock().unwrap().len(), 0);
    assert!(h.service.poll(now).is_none());
}

#[test]
fn test_playback_hits_cache_second_time() {
    let mut h = harness(true, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::Say("Hello".to_string()), now);
    let done = h.service.poll(now).unwrap();
    h.service.poll(done);

    h.service
        .handle_command(Command::Say("Hello".to_string()), done + Duration::from_secs(1));
    h.service.poll(done + Duration::from_secs(1));

    // Two playbacks, one synthesis
    assert_eq!(h.played.lock().unwrap().len(), 2);
    assert_eq!(h.synthesized.lock().unwrap().len(), 1);
}

#[test]
fn test_repeat_without_cache_reuses_artifact() {
    let mut h = harness(false, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::Say("Hello".to_string()), now);
    let done = h.service.poll(now).unwrap();
    h.service.poll(done);

    let later = done + Duration::from_secs(1);
    h.service.handle_command(Command::Say("Hello".to_string()), later);
    h.service.poll(later);

    // One synthesis, two playbacks of the same artifact
    assert_eq!(h.synthesized.lock().unwrap().len(), 1);
    let played = h.played.lock().unwrap();
    assert_eq!(played.len(), 2);
    assert_eq!(played[0].0, played[1].0);
}

#[test]
fn test_stale_artifact_removed_on_new_synthesis() {
    let mut h = harness(false, None, false);
    let now = Instant::now();

    h.service.handle_command(Command::Say("one".to_string()), now);
    let done = h.service.poll(now).unwrap();
    h.service.poll(done);

    let first = h._dir.path().join("synth-1.mp3");
    assert!(first.exists());

    h.service.handle_command(Command::Say("two".to_string()), done);
    h.service.poll(done);

    // The superseded temp artifact is gone, only the newest remains
    assert!(!first.exists());
    assert!(h._dir.path().join("synth-2.mp3").exists());
}

#[test]
fn test_file_reference_bypasses_synthesis() {
    let mut h = harness(true, None, false);
    let dir = tempfile::tempdir().unwrap();
    let bell = dir.path().join("bell.mp3");
    fs::write(&bell, b"bell bytes").unwrap();
    let now = Instant::now();

    h.service
        .handle_command(Command::Say(bell.display().to_string()), now);
    h.service.poll(now);

    assert_eq!(h.played.lock().unwrap().len(), 1);
    assert_eq!(h.synthesized.lock().unwrap().len(), 0);
    // Mirrored under its reference key, invisible to synthesis lookups
    assert_eq!(cached_artifacts(&h.cache_root), 1);
}

#[test]
fn test_synthesis_failure_advances_queue() {
    let mut h = harness(false, None, true);
    let now = Instant::now();

    h.service.handle_command(Command::Say("one".to_string()), now);
    h.service.handle_command(Command::Say("two".to_string()), now);
    h.service.poll(now);

    // Both items failed with duration 0 and drained in a single poll
    assert_eq!(h.service.queue_len(), 0);
    assert_eq!(h.played.lock().unwrap().len(), 0);
    assert!(h.service.is_idle());
}
