//! Transport state and the snapshot handed to observers.

use super::eq::EqBands;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Transport state machine.
///
/// ```text
/// Idle ──play_track──> Loading ──ready──> Playing <──toggle──> Paused
///                         │                  │                   ▲
///                      missing            end of media        seek(t < duration)
///                         ▼                  ▼                   │
///                        Idle              Ended ────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Loading,
    Playing,
    Paused,
    /// Paused at the end of the media
    Ended,
}

impl TransportState {
    /// Whether a source is loaded and positioned.
    pub fn has_source(&self) -> bool {
        matches!(
            self,
            TransportState::Playing | TransportState::Paused | TransportState::Ended
        )
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Idle => "idle",
            TransportState::Loading => "loading",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the engine. Observers pull one after a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub state: TransportState,
    pub current_track_id: Option<String>,
    pub is_playing: bool,
    pub current_time: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub eq: EqBands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_source() {
        assert!(!TransportState::Idle.has_source());
        assert!(!TransportState::Loading.has_source());
        assert!(TransportState::Playing.has_source());
        assert!(TransportState::Ended.has_source());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&TransportState::Ended).unwrap();
        assert_eq!(json, "\"ended\"");
    }
}
