//! Background pre-cache worker
//!
//! A second serial queue that fills the cache ahead of playback demand. It
//! owns its own generation slot (an explicit busy flag), so at most one
//! background synthesis runs at a time and live playback never competes
//! with it. After each generation a fixed cooldown throttles load on the
//! synthesis backend; cache hits short-circuit without cooldown.

use crate::request::Request;
use log::warn;
use std::collections::VecDeque;
use std::time::Duration;

/// Cooldown observed after each generation, success or failure
pub const GENERATION_COOLDOWN: Duration = Duration::from_secs(2);

/// Result of submitting a command to the worker
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The generation slot was free; start generating this request now
    Start(Request),
    /// A generation is running; the request joined the pending list
    Queued,
    /// Not cacheable (file reference, caching disabled, or the device
    /// target needs no artifacts)
    Rejected,
}

/// Pre-cache FIFO with an explicit generation slot
pub struct PreCache {
    pending: VecDeque<Request>,

    /// The generation slot: true while a synthesis (or its cooldown) is
    /// outstanding
    running: bool,
}

impl PreCache {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            running: false,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Submit a decoded request for background caching
    pub fn submit(
        &mut self,
        request: Request,
        cache_enabled: bool,
        artifacts_required: bool,
    ) -> SubmitOutcome {
        if !cache_enabled {
            warn!("Cache is not enabled. Unable to cache: {:?}", request.text);
            return SubmitOutcome::Rejected;
        }
        if request.is_file_ref() {
            warn!("Audio file reference must not be cached: {:?}", request.text);
            return SubmitOutcome::Rejected;
        }
        if !artifacts_required {
            warn!(
                "Cache not required for this device target, skipping: {:?}",
                request.text
            );
            return SubmitOutcome::Rejected;
        }

        if self.running {
            self.pending.push_back(request);
            SubmitOutcome::Queued
        } else {
            self.running = true;
            SubmitOutcome::Start(request)
        }
    }

    /// Take the next pending request after a generation (and its cooldown)
    /// finished. Clears the slot when nothing is pending.
    pub fn next(&mut self) -> Option<Request> {
        match self.pending.pop_front() {
            Some(req) => Some(req),
            None => {
                self.running = false;
                None
            }
        }
    }
}

impl Default for PreCache {
    fn default() -> Self {
        Self::new()
    }
}
