//! Playback queue
//!
//! An ordered, single-consumer sequence of pending utterances. Only the
//! head item is ever in flight; appending while something is playing does
//! not start independent playback. Two enqueue-time rules apply: rapid
//! duplicates of the tail item are suppressed, and after sufficient idle
//! time a configured announcement is inserted ahead of the new utterance.

use crate::request::Request;
use log::{debug, warn};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Window within which an identical tail text suppresses a new enqueue
const SUPPRESSION_WINDOW: Duration = Duration::from_millis(500);

/// Announcement preemption settings
#[derive(Debug, Clone)]
pub struct AnnounceSettings {
    /// Resolved announcement audio file
    pub file: PathBuf,

    /// Idle time after the last completion before the announcement plays
    /// again
    pub idle_timeout: Duration,

    /// Percent of the requested volume the announcement plays at
    pub volume_percent: u8,
}

/// One queued utterance
#[derive(Debug)]
pub struct QueueItem {
    pub request: Request,

    /// Announcement items are file references inserted by the queue itself
    pub is_announcement: bool,
}

/// Result of an enqueue attempt
#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Queue was empty; the caller should begin resolving the head
    Started,
    /// An item is already in flight; nothing further to do
    Queued,
    /// Dropped as a rapid duplicate of the tail item
    Suppressed,
}

/// Ordered utterance queue with announce preemption
pub struct PlaybackQueue {
    items: VecDeque<QueueItem>,

    /// When the last item finished playing; drives the announce idle check
    last_completed: Option<Instant>,

    announce: Option<AnnounceSettings>,
}

impl PlaybackQueue {
    pub fn new(announce: Option<AnnounceSettings>) -> Self {
        Self {
            items: VecDeque::new(),
            last_completed: None,
            announce,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The item currently in flight (or about to be)
    pub fn head(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    /// Append an utterance, applying duplicate suppression and announce
    /// preemption
    ///
    /// `default_volume` is used to scale the announcement when the request
    /// carries no volume of its own. The caller begins resolution only on
    /// `Started`.
    pub fn enqueue(&mut self, request: Request, default_volume: u8, now: Instant) -> EnqueueOutcome {
        if let Some(tail) = self.items.back() {
            if tail.request.text == request.text
                && request
                    .enqueued
                    .saturating_duration_since(tail.request.enqueued)
                    < SUPPRESSION_WINDOW
            {
                warn!("Same text within half a second, ignoring: {:?}", request.text);
                return EnqueueOutcome::Suppressed;
            }
        }

        let was_empty = self.items.is_empty();

        if was_empty {
            if let Some(announce) = self.announce_due(now) {
                debug!("Preceding utterance with announcement");
                let volume = request.volume.unwrap_or(default_volume);
                let scaled = (volume as u16 * announce.volume_percent as u16 / 100) as u8;
                let item = QueueItem {
                    request: Request {
                        text: announce.file.to_string_lossy().into_owned(),
                        language: request.language.clone(),
                        volume: Some(scaled),
                        enqueued: now,
                    },
                    is_announcement: true,
                };
                self.items.push_back(item);
            }
        }

        self.items.push_back(QueueItem {
            request,
            is_announcement: false,
        });

        if was_empty {
            EnqueueOutcome::Started
        } else {
            EnqueueOutcome::Queued
        }
    }

    /// Announcement settings, if one is due for a fresh enqueue right now
    fn announce_due(&self, now: Instant) -> Option<&AnnounceSettings> {
        let announce = self.announce.as_ref()?;
        match self.last_completed {
            None => Some(announce),
            Some(last) => {
                if now.saturating_duration_since(last) > announce.idle_timeout {
                    Some(announce)
                } else {
                    None
                }
            }
        }
    }

    /// Dequeue the head after its playback completed (or failed), recording
    /// the completion time. Returns true when another item is waiting; the
    /// caller resolves it on a fresh driver iteration, never synchronously.
    pub fn complete_head(&mut self, now: Instant) -> bool {
        if let Some(item) = self.items.pop_front() {
            debug!("Completed: {:?}", item.request.text);
        }
        self.last_completed = Some(now);
        !self.items.is_empty()
    }
}
