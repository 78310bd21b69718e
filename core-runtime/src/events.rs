//! Core events
//!
//! One `tokio::sync::broadcast` channel carries every notification the core
//! produces: library mutations, download progress, transport changes and
//! token lifecycle. The content manager, playback engine and token provider
//! publish; the host and the service's queue driver subscribe.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Library(LibraryEvent::Cleared)).ok();
//!
//! assert_eq!(rx.recv().await.unwrap(), CoreEvent::Library(LibraryEvent::Cleared));
//! # }
//! ```
//!
//! A receiver that falls more than the buffer size behind gets
//! `RecvError::Lagged(n)` once and then resumes with the oldest retained
//! event.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Offline library changes
    Library(LibraryEvent),
    /// Download progress and failures
    Download(DownloadEvent),
    /// Transport and signal-chain changes
    Playback(PlaybackEvent),
    /// Token lifecycle
    Auth(AuthEvent),
}

impl CoreEvent {
    /// The track a playback event retires: it either played to the end or
    /// had no stored audio. Collection playback moves on from it.
    pub fn finished_track(&self) -> Option<&str> {
        match self {
            CoreEvent::Playback(PlaybackEvent::Ended { track_id })
            | CoreEvent::Playback(PlaybackEvent::TrackNotFound { track_id }) => Some(track_id),
            _ => None,
        }
    }

    pub fn is_download(&self) -> bool {
        matches!(self, CoreEvent::Download(_))
    }

    pub fn is_library(&self) -> bool {
        matches!(self, CoreEvent::Library(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    TrackDownloaded {
        track_id: String,
        name: String,
        size_bytes: u64,
    },
    AlbumDownloaded {
        album_id: String,
        name: String,
        track_count: usize,
        size_bytes: u64,
    },
    PlaylistDownloaded {
        playlist_id: String,
        name: String,
        track_count: usize,
        size_bytes: u64,
    },
    TrackDeleted {
        track_id: String,
    },
    /// An album record was removed. Tracks still referenced elsewhere are
    /// listed in `retained_tracks`.
    AlbumDeleted {
        album_id: String,
        removed_tracks: Vec<String>,
        retained_tracks: Vec<String>,
    },
    PlaylistDeleted {
        playlist_id: String,
        removed_tracks: Vec<String>,
        retained_tracks: Vec<String>,
    },
    Cleared,
}


/// Snapshot of one batch download. Not persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadProgress {
    pub is_downloading: bool,
    pub total: usize,
    pub completed: usize,
    pub current_item_name: Option<String>,
}

impl DownloadProgress {
    pub fn started(total: usize, first_item: Option<String>) -> Self {
        Self {
            is_downloading: true,
            total,
            completed: 0,
            current_item_name: first_item,
        }
    }

    pub fn complete(total: usize, completed: usize) -> Self {
        Self {
            is_downloading: false,
            total,
            completed,
            current_item_name: None,
        }
    }

    /// Completion as a fraction in `[0, 1]`. An empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f64 / self.total as f64).min(1.0)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    Progress(DownloadProgress),
    Failed { item_id: String, message: String },
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Started { track_id: String, duration_ms: u64 },
    Paused { track_id: String, position_ms: u64 },
    Resumed { track_id: String, position_ms: u64 },
    Stopped { track_id: String },
    /// Natural end of media. Collection playback advances on this.
    Ended { track_id: String },
    TrackNotFound { track_id: String },
    VolumeChanged { volume: f32 },
    EqChanged { bass_db: f32, mid_db: f32, treble_db: f32 },
}


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    TokenRefreshed {
        /// Unix epoch milliseconds.
        expires_at: i64,
    },
    SignedOut,
    AuthError {
        message: String,
        recoverable: bool,
    },
}


/// Central event bus for publishing and subscribing to events.
///
/// Cloning shares the underlying channel. Each `subscribe()` creates an
/// independent receiver that sees events published after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events rejected by its predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let downloads = EventStream::new(event_bus.subscribe()).filter(CoreEvent::is_download);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Next accepted event. Lag and closure are reported as by the
    /// underlying receiver.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking `recv`; `None` once the buffer holds nothing accepted.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_downloaded(id: &str) -> CoreEvent {
        CoreEvent::Library(LibraryEvent::TrackDownloaded {
            track_id: id.to_string(),
            name: format!("Song {}", id),
            size_bytes: 50_000,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(CoreEvent::Library(LibraryEvent::Cleared)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let sent = bus.emit(track_downloaded("t1")).unwrap();
        assert_eq!(sent, 2);

        assert_eq!(a.recv().await.unwrap(), track_downloaded("t1"));
        assert_eq!(b.recv().await.unwrap(), track_downloaded("t1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(16);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(CoreEvent::is_download);

        bus.emit(track_downloaded("t1")).unwrap();
        let progress = CoreEvent::Download(DownloadEvent::Progress(DownloadProgress::started(
            3,
            Some("Intro".to_string()),
        )));
        bus.emit(progress.clone()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), progress);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(track_downloaded(&format!("t{}", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_finished_track() {
        let ended = CoreEvent::Playback(PlaybackEvent::Ended {
            track_id: "t1".to_string(),
        });
        let missing = CoreEvent::Playback(PlaybackEvent::TrackNotFound {
            track_id: "t2".to_string(),
        });
        let stopped = CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: "t3".to_string(),
        });

        assert_eq!(ended.finished_track(), Some("t1"));
        assert_eq!(missing.finished_track(), Some("t2"));
        assert_eq!(stopped.finished_track(), None);
        assert_eq!(track_downloaded("t4").finished_track(), None);
        assert!(track_downloaded("t4").is_library());
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = CoreEvent::Playback(PlaybackEvent::Ended {
            track_id: "t9".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "Ended");
        assert_eq!(json["payload"]["track_id"], "t9");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_progress_fraction() {
        let mut p = DownloadProgress::started(4, None);
        assert_eq!(p.fraction(), 0.0);
        p.completed = 2;
        assert_eq!(p.fraction(), 0.5);
        assert_eq!(DownloadProgress::started(0, None).fraction(), 1.0);
    }
}
