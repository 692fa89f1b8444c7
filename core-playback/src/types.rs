//! Value types shared by the playback service, its controller and observers.

use bridge_traits::playback::PlaybackStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identity of one playback service instance.
///
/// A new id is minted every time the host creates the service, so a handle
/// from a destroyed instance never compares equal to a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInstanceId(Uuid);

impl ServiceInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ServiceInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServiceInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Replay the current track on completion.
    One,
    /// Wrap to the start of the queue on completion.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipDirection {
    Next,
    Previous,
}

/// Argument of `play`: a single track or a queue with a starting index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
    pub queue: Vec<String>,
    pub start_index: usize,
}

impl PlayRequest {
    pub fn track(track_id: impl Into<String>) -> Self {
        Self {
            queue: vec![track_id.into()],
            start_index: 0,
        }
    }

    pub fn queue<I, S>(tracks: I, start_index: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: tracks.into_iter().map(Into::into).collect(),
            start_index,
        }
    }
}

/// The most recent failure surfaced to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    pub track_id: String,
    pub message: String,
}

/// Read view of the session, published wholesale on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub instance_id: ServiceInstanceId,
    pub status: PlaybackStatus,
    pub current_track: Option<String>,
    pub position: Duration,
    pub queue: Vec<String>,
    /// Index into `queue` of the current (or last) track.
    pub queue_index: Option<usize>,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
    /// Set while a failure has not been superseded by successful playback,
    /// an explicit `play` or a `reset`.
    pub last_failure: Option<PlaybackFailure>,
    pub consecutive_failures: u32,
    /// Strictly increasing per instance.
    pub revision: u64,
}

impl PlaybackSnapshot {
    pub fn initial(instance_id: ServiceInstanceId) -> Self {
        Self {
            instance_id,
            status: PlaybackStatus::Idle,
            current_track: None,
            position: Duration::ZERO,
            queue: Vec::new(),
            queue_index: None,
            repeat_mode: RepeatMode::Off,
            shuffle: false,
            last_failure: None,
            consecutive_failures: 0,
            revision: 0,
        }
    }

    /// The error flag observers render.
    pub fn has_error(&self) -> bool {
        self.last_failure.is_some()
    }
}
