//! Queue manager and driver loop
//!
//! The `Service` owns all mutable state: the playback queue, the pre-cache
//! worker, the cache, the synthesis gateway and the playback device. It is
//! driven by messages over a channel plus two lazy deadlines (playback
//! completion and pre-cache cooldown); no timers run in the background and
//! no state lives in globals. After a completion the next head is resolved
//! on a fresh loop iteration, which bounds stack depth under bursty input.

pub mod precache;
pub mod queue;

use crate::cache::Cache;
use crate::player::{PlaybackSource, Player};
use crate::request::{self, Request};
use crate::speech::SpeechEngine;
use crate::{Result, SpeakdError};
use log::{debug, error, info, warn};
use precache::{PreCache, SubmitOutcome, GENERATION_COOLDOWN};
use queue::{AnnounceSettings, EnqueueOutcome, PlaybackQueue};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Upper bound on how long an explicit stop waits for in-flight playback
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Inbound messages for the service loop
#[derive(Debug)]
pub enum Command {
    /// Speak a raw command now (decoded on receipt)
    Say(String),
    /// Pre-cache a raw command in the background
    CacheText(String),
    /// Apply a volume to the device, or remember it as the default
    SetVolume(u8),
    /// Stop after a bounded grace period for in-flight playback
    Stop,
}

/// Service construction settings
pub struct ServiceSettings {
    /// Volume used when a command carries none
    pub default_volume: u8,

    /// Announcement preemption, when configured
    pub announce: Option<AnnounceSettings>,
}

/// Result of the most recent synthesis, reused for back-to-back identical
/// utterances when no cache hit intervenes
struct Generated {
    language: String,
    text: String,
    path: PathBuf,
}

/// The queue manager owning all playback state
pub struct Service {
    queue: PlaybackQueue,
    precache: PreCache,
    cache: Cache,
    synth: Box<dyn SpeechEngine>,
    player: Box<dyn Player>,
    default_volume: u8,
    last_generated: Option<Generated>,

    /// When the in-flight playback completes
    completion_at: Option<Instant>,

    /// When the pre-cache cooldown ends and the next generation may start
    precache_resume_at: Option<Instant>,

    /// A freshly exposed queue head awaits resolution on the next iteration
    resolve_pending: bool,

    stopping: bool,
}

impl Service {
    /// Build the service and run the engine-change invalidation barrier
    ///
    /// The barrier completes before either generation slot performs its
    /// first lookup or store; a failing barrier is logged and the service
    /// continues degraded.
    pub fn new(
        cache: Cache,
        synth: Box<dyn SpeechEngine>,
        player: Box<dyn Player>,
        settings: ServiceSettings,
    ) -> Self {
        if let Err(e) = cache.invalidate_if_engine_changed(synth.id()) {
            error!("Cache invalidation failed: {}", e);
        }

        Self {
            queue: PlaybackQueue::new(settings.announce),
            precache: PreCache::new(),
            cache,
            synth,
            player,
            default_volume: settings.default_volume,
            last_generated: None,
            completion_at: None,
            precache_resume_at: None,
            resolve_pending: false,
            stopping: false,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn precache_pending(&self) -> usize {
        self.precache.pending_len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.precache.is_running() && self.completion_at.is_none()
    }

    /// Apply one inbound command
    pub fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Say(raw) => self.handle_say(&raw, now),
            Command::CacheText(raw) => self.handle_cache_text(&raw, now),
            Command::SetVolume(volume) => self.handle_set_volume(volume),
            Command::Stop => self.stopping = true,
        }
    }

    fn handle_say(&mut self, raw: &str, now: Instant) {
        let request = match request::decode(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!("Cannot say: {}", e);
                return;
            }
        };

        match self.queue.enqueue(request, self.default_volume, now) {
            EnqueueOutcome::Started => self.resolve_pending = true,
            EnqueueOutcome::Queued | EnqueueOutcome::Suppressed => {}
        }
    }

    fn handle_cache_text(&mut self, raw: &str, now: Instant) {
        let request = match request::decode(raw) {
            Ok(req) => req,
            Err(e) => {
                warn!("Cannot cache: {}", e);
                return;
            }
        };

        let outcome = self.precache.submit(
            request,
            self.cache.enabled(),
            self.player.requires_artifact(),
        );
        if let SubmitOutcome::Start(req) = outcome {
            self.start_generation(req, now);
        }
    }

    fn handle_set_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        if self.player.supports_device_volume() {
            if let Err(e) = self.player.set_device_volume(volume) {
                error!("Cannot set device volume: {}", e);
            }
        } else {
            debug!("Remembering volume {} for subsequent utterances", volume);
        }
        self.default_volume = volume;
    }

    /// Run all due work and report the next wake deadline
    ///
    /// Processes one event per iteration: a pending head resolution, a due
    /// playback completion, or a due pre-cache resume. Queue advancement
    /// after a completion always lands on a fresh iteration.
    pub fn poll(&mut self, now: Instant) -> Option<Instant> {
        loop {
            if self.resolve_pending {
                self.resolve_pending = false;
                self.resolve_head(now);
                continue;
            }

            if let Some(at) = self.completion_at {
                if now >= at {
                    self.completion_at = None;
                    if self.queue.complete_head(now) {
                        self.resolve_pending = true;
                    }
                    continue;
                }
            }

            if let Some(at) = self.precache_resume_at {
                if now >= at {
                    self.precache_resume_at = None;
                    if let Some(req) = self.precache.next() {
                        self.start_generation(req, now);
                    }
                    continue;
                }
            }

            break;
        }

        match (self.completion_at, self.precache_resume_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Drive the service from a command channel until stopped
    ///
    /// The wait is capped at 100 ms so an externally raised stop flag
    /// (signal handler) is noticed promptly even while idle.
    pub fn run(&mut self, rx: Receiver<Command>, stop: &AtomicBool) {
        loop {
            if stop.load(Ordering::Relaxed) {
                self.stopping = true;
            }

            let deadline = self.poll(Instant::now());

            if self.stopping {
                self.wait_for_inflight();
                info!("stopping...");
                return;
            }

            let timeout = deadline
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(100))
                .min(Duration::from_millis(100));

            match rx.recv_timeout(timeout) {
                Ok(cmd) => self.handle_command(cmd, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Bounded grace period for in-flight playback on stop
    fn wait_for_inflight(&self) {
        if let Some(at) = self.completion_at {
            let remaining = at.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                std::thread::sleep(remaining.min(STOP_GRACE));
            }
        }
    }

    /// Resolve the queue head to an audio source and start playback
    ///
    /// Errors complete the item with duration 0; the queue always advances.
    fn resolve_head(&mut self, now: Instant) {
        let Some(item) = self.queue.head() else {
            return;
        };
        let text = item.request.text.clone();
        let language = item.request.language.clone();
        let volume = item.request.volume.unwrap_or(self.default_volume);

        info!("saying: {:?}", text);

        let duration = match self.resolve_and_play(&text, language.as_deref(), volume) {
            Ok(duration) => duration,
            Err(e) => {
                error!("Cannot play {:?}: {}", text, e);
                0.0
            }
        };
        debug!("Duration {:?}: {:.2}s", text, duration);

        self.completion_at = Some(now + Duration::from_secs_f64(duration.max(0.0)));
    }

    fn resolve_and_play(&mut self, text: &str, language: Option<&str>, volume: u8) -> Result<f64> {
        // Audio file reference: fetch bytes, skip synthesis entirely
        if text.starts_with('/') {
            let path = self.resolve_file_ref(text)?;
            return self.player.play(PlaybackSource::Artifact(&path), volume);
        }

        // Targets that speak natively skip artifact generation
        if !self.player.requires_artifact() {
            return self.player.play(PlaybackSource::Text { text, language }, volume);
        }

        if let Some(path) = self.cache.lookup(language, text) {
            return self.player.play(PlaybackSource::Artifact(&path), volume);
        }

        // Re-synthesis elision for back-to-back identical utterances
        let lang_key = language.unwrap_or("").to_string();
        if let Some(generated) = &self.last_generated {
            if generated.language == lang_key && generated.text == text && generated.path.exists() {
                debug!("Reusing previous synthesis result for {:?}", text);
                let path = generated.path.clone();
                return self.player.play(PlaybackSource::Artifact(&path), volume);
            }
        }

        let (path, _) = self.synth.synthesize(text, language)?;
        self.remember_generated(lang_key, text.to_string(), path.clone());

        let play_path = self.mirror_into_cache(language, text, &path);
        self.player.play(PlaybackSource::Artifact(&play_path), volume)
    }

    /// Remember the newest synthesis output, removing the temp artifact it
    /// supersedes so the temp directory stays bounded
    fn remember_generated(&mut self, language: String, text: String, path: PathBuf) {
        if let Some(old) = self.last_generated.take() {
            if old.path != path && old.path.exists() {
                if let Err(e) = fs::remove_file(&old.path) {
                    debug!("Cannot remove stale artifact {}: {}", old.path.display(), e);
                }
            }
        }
        self.last_generated = Some(Generated {
            language,
            text,
            path,
        });
    }

    /// Store a fresh artifact in the cache, degrading to the original path
    /// on any cache failure
    fn mirror_into_cache(&self, language: Option<&str>, text: &str, path: &Path) -> PathBuf {
        if !self.cache.enabled() {
            return path.to_path_buf();
        }
        let stored = fs::read(path)
            .map_err(|e| SpeakdError::Cache(format!("Cannot read artifact: {}", e)))
            .and_then(|bytes| self.cache.store(language, text, &bytes));
        match stored {
            Ok(Some(cached)) => cached,
            Ok(None) => path.to_path_buf(),
            Err(e) => {
                warn!("Cannot cache artifact for {:?}: {}", text, e);
                path.to_path_buf()
            }
        }
    }

    /// Resolve a file reference to playable bytes: mirrored cache copy
    /// first, then the filesystem (mirroring into the cache on the way)
    fn resolve_file_ref(&mut self, text: &str) -> Result<PathBuf> {
        if let Some(cached) = self.cache.lookup_file_ref(text) {
            return Ok(cached);
        }

        let source = Path::new(text);
        if !source.exists() {
            return Err(SpeakdError::Playback(format!("File {:?} not found", text)));
        }

        if self.cache.enabled() {
            match fs::read(source) {
                Ok(bytes) => match self.cache.store_file_ref(text, &bytes) {
                    Ok(Some(mirrored)) => return Ok(mirrored),
                    Ok(None) => {}
                    Err(e) => warn!("Cannot mirror {:?}: {}", text, e),
                },
                Err(e) => warn!("Cannot read {:?}: {}", text, e),
            }
        }

        Ok(source.to_path_buf())
    }

    /// Start a background generation, short-circuiting through cache hits
    /// without cooldown
    fn start_generation(&mut self, request: Request, now: Instant) {
        let mut current = Some(request);

        while let Some(req) = current {
            if self.cache.lookup(req.language.as_deref(), &req.text).is_some() {
                debug!("Text is already cached: {:?}", req.text);
                current = self.precache.next();
                continue;
            }

            match self.generate_into_cache(&req) {
                Ok(path) => debug!("Text is cached: {:?} under {}", req.text, path.display()),
                Err(e) => error!("Cannot cache text {:?}: {}", req.text, e),
            }

            // Cooldown throttles the synthesis backend, hit or miss
            self.precache_resume_at = Some(now + GENERATION_COOLDOWN);
            return;
        }
    }

    fn generate_into_cache(&mut self, request: &Request) -> Result<PathBuf> {
        let language = request.language.as_deref();
        let (path, _) = self.synth.synthesize(&request.text, language)?;
        self.remember_generated(
            language.unwrap_or("").to_string(),
            request.text.clone(),
            path.clone(),
        );

        let bytes = fs::read(&path)
            .map_err(|e| SpeakdError::Cache(format!("Cannot read artifact: {}", e)))?;
        match self.cache.store(language, &request.text, &bytes)? {
            Some(stored) => Ok(stored),
            None => Err(SpeakdError::Cache("caching disabled".to_string())),
        }
    }
}
