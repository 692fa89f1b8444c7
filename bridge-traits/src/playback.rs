//! Playback bridge traits and supporting audio types.
//!
//! These abstractions allow the core playback service to drive the platform's
//! native media pipeline (ExoPlayer/MediaPlayer, AVPlayer, a desktop engine)
//! without knowing anything about decoding or mixing. Host applications are
//! expected to provide concrete implementations that satisfy their platform
//! constraints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Playback lifecycle status of the session owned by the playback service.
///
/// ```text
/// Idle ──play──▶ Preparing ──ready──▶ Playing ⇄ Paused
///                   │ ▲                  │        │
///                   │ └──────skip────────┴────────┘
///                   ▼
///                 Error ──reset──▶ Idle
///
/// any state ──stop──▶ Stopped ──play──▶ Preparing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Preparing,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl PlaybackStatus {
    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: PlaybackStatus) -> bool {
        use PlaybackStatus::*;

        match (self, next) {
            (_, Stopped) => self != Stopped,
            (Idle | Stopped, Preparing) => true,
            (Preparing | Playing | Paused, Preparing) => true,
            (Preparing, Playing) => true,
            (Playing, Paused) | (Paused, Playing) => true,
            (Preparing | Playing | Paused, Error) => true,
            (Error, Idle) => true,
            _ => false,
        }
    }

    /// Whether an engine session is loaded (position and seek are meaningful).
    pub fn has_loaded_track(self) -> bool {
        matches!(self, PlaybackStatus::Playing | PlaybackStatus::Paused)
    }

    /// Whether the session is actively producing (or about to produce) audio.
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackStatus::Preparing | PlaybackStatus::Playing)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Preparing => "preparing",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// High-level audio source descriptor provided to playback adapters.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    /// Remote stream without extra headers.
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Additional playback options supplied alongside a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    /// Initial playback position (defaults to start of stream).
    pub start_position: Duration,
    /// Initial volume (0.0 = muted, 1.0 = unity gain).
    pub initial_volume: f32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_position: Duration::from_secs(0),
            initial_volume: 1.0,
        }
    }
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata associated with a playback request, surfaced to platform media
/// sessions and lock-screen controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackMetadata {
    pub track_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

/// Request describing the playback session a host adapter should provision.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub source: AudioSource,
    pub options: PlaybackOptions,
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            options: PlaybackOptions::default(),
            metadata: PlaybackMetadata::default(),
        }
    }

    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Asynchronous notification raised by the native engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The session reached the end of its stream.
    Completed { session: PlaybackSessionId },
    /// The session failed after it had started (decoder error, lost stream).
    Failed {
        session: PlaybackSessionId,
        message: String,
    },
}

impl EngineEvent {
    pub fn session(&self) -> PlaybackSessionId {
        match self {
            EngineEvent::Completed { session } | EngineEvent::Failed { session, .. } => *session,
        }
    }
}

/// Stream of engine events.
#[async_trait]
pub trait EngineEventStream: Send {
    /// Get the next engine event.
    ///
    /// Returns `None` when the engine shuts down.
    async fn next(&mut self) -> Option<EngineEvent>;
}

/// Trait for platform-specific playback adapters that drive native audio engines.
#[async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Prepare a playback session. Implementations may open the stream, buffer
    /// the first packets, and configure audio routes. Returns once the session
    /// is ready to play.
    async fn prepare(&self, request: PlaybackRequest) -> Result<PlaybackSessionId>;

    /// Begin or resume playback for the provided session.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Stop playback.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    /// Seek to an absolute position within the stream.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Query the current playback position.
    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration>;

    /// Release resources associated with a playback session.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;

    /// Subscribe to engine callbacks (completion, late failures).
    async fn subscribe_events(&self) -> Result<Box<dyn EngineEventStream>>;
}

/// Platform audio-focus arbitration.
///
/// - **Android**: `AudioManager.requestAudioFocus`
/// - **iOS**: `AVAudioSession.setActive`
/// - **Desktop**: usually a no-op
#[async_trait]
pub trait AudioFocus: Send + Sync {
    /// Request focus before audible playback. Returns `false` if denied.
    async fn request_focus(&self) -> Result<bool>;

    /// Release focus once playback stops being audible.
    async fn abandon_focus(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackStatus::*;

    const ALL: [PlaybackStatus; 6] = [Idle, Preparing, Playing, Paused, Stopped, Error];

    #[test]
    fn idle_cannot_jump_to_playing() {
        assert!(!Idle.can_transition_to(Playing));
        assert!(Idle.can_transition_to(Preparing));
    }

    #[test]
    fn paused_requires_prior_playing() {
        for from in ALL {
            let allowed = from.can_transition_to(Paused);
            assert_eq!(allowed, from == Playing, "{from} -> paused");
        }
    }

    #[test]
    fn every_state_except_stopped_can_stop() {
        for from in ALL {
            assert_eq!(from.can_transition_to(Stopped), from != Stopped);
        }
    }

    #[test]
    fn error_only_resets_to_idle() {
        for to in ALL {
            let allowed = Error.can_transition_to(to);
            assert_eq!(allowed, matches!(to, Idle | Stopped), "error -> {to}");
        }
    }

    #[test]
    fn skip_reenters_preparing() {
        assert!(Playing.can_transition_to(Preparing));
        assert!(Paused.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Preparing));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&Preparing).unwrap();
        assert_eq!(json, "\"preparing\"");
    }

    #[test]
    fn session_id_is_unique() {
        let a = PlaybackSessionId::new();
        let b = PlaybackSessionId::new();
        assert_ne!(a, b);
    }
}
