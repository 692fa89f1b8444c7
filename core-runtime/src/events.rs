//! Typed notifications shared by the core's components.
//!
//! The playback service reports transitions and failures, the connection
//! proxy reports bind progress, the integrity gate reports its verdict and
//! the service host reports lifecycle. Everything goes through one
//! `tokio::sync::broadcast` channel owned by [`EventBus`].
//!
//! A subscriber that falls more than the bus capacity behind gets
//! `RecvError::Lagged(n)` once and then continues with newer events.
//! Emitting with no subscribers is an error that publishers ignore.
//!
//! ```rust
//! use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut events = bus.subscribe();
//! bus.emit(CoreEvent::Connection(ConnectionEvent::Connecting)).ok();
//! assert_eq!(events.recv().await.unwrap().to_string(), "Binding playback service");
//! # }
//! ```

use bridge_traits::foreground::StartMode;
use bridge_traits::playback::PlaybackStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Connection(ConnectionEvent),
    Integrity(IntegrityEvent),
    Service(ServiceEvent),
}

impl fmt::Display for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Connection(e) => e.description(),
            CoreEvent::Integrity(e) => e.description(),
            CoreEvent::Service(e) => e.description(),
        };
        f.write_str(text)
    }
}

/// Events raised by the playback service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The session moved between two states.
    StateChanged {
        from: PlaybackStatus,
        to: PlaybackStatus,
        /// Current track after the transition, if any.
        track_id: Option<String>,
    },
    /// Preparing a track failed.
    TrackFailed {
        track_id: String,
        message: String,
        /// Consecutive failures including this one.
        consecutive_failures: u32,
    },
    /// The queue was stopped after too many consecutive failures.
    QueueStopped {
        consecutive_failures: u32,
    },
    /// Periodic position report while playing.
    PositionChanged {
        track_id: String,
        position_ms: u64,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::TrackFailed { .. } => "Track failed to prepare",
            PlaybackEvent::QueueStopped { .. } => "Queue stopped after repeated failures",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
        }
    }
}

/// Events raised by the service connection proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectionEvent {
    /// A bind request is in flight.
    Connecting,
    /// The controller was published for the given service instance.
    Connected { instance_id: String },
    /// The controller was withdrawn.
    Disconnected {
        /// `true` when the service went away on its own (crash, kill).
        unexpected: bool,
    },
}

impl ConnectionEvent {
    fn description(&self) -> &str {
        match self {
            ConnectionEvent::Connecting => "Binding playback service",
            ConnectionEvent::Connected { .. } => "Playback service connected",
            ConnectionEvent::Disconnected { .. } => "Playback service disconnected",
        }
    }
}

/// Verdicts of the build authorization gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IntegrityEvent {
    /// The manifest lists the running build.
    Passed,
    /// The manifest could not be obtained or parsed; startup proceeds.
    Inconclusive { reason: String },
    /// The manifest does not list the running build; the process exits.
    Revoked {
        version_name: String,
        version_code: i64,
    },
    /// The local tamper check failed; the process exits.
    Untrusted,
}

impl IntegrityEvent {
    fn description(&self) -> &str {
        match self {
            IntegrityEvent::Passed => "Build authorized",
            IntegrityEvent::Inconclusive { .. } => "Build authorization inconclusive",
            IntegrityEvent::Revoked { .. } => "Build revoked",
            IntegrityEvent::Untrusted => "Installation failed tamper check",
        }
    }
}

/// Playback service lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ServiceEvent {
    Started { mode: StartMode, instance_id: String },
    Destroyed { instance_id: String },
}

impl ServiceEvent {
    fn description(&self) -> &str {
        match self {
            ServiceEvent::Started { .. } => "Playback service started",
            ServiceEvent::Destroyed { .. } => "Playback service destroyed",
        }
    }
}

/// Cloneable handle to the process-wide broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how far a subscriber may fall behind before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers received the event.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_changed(from: PlaybackStatus, to: PlaybackStatus) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::StateChanged {
            from,
            to,
            track_id: Some("track-1".to_string()),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus
            .emit(CoreEvent::Connection(ConnectionEvent::Connecting))
            .is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = state_changed(PlaybackStatus::Idle, PlaybackStatus::Preparing);
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                track_id: "track-1".to_string(),
                position_ms: i * 1000,
            }))
            .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(3))));
        assert!(matches!(
            sub.recv().await,
            Ok(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                position_ms: 3000,
                ..
            }))
        ));
    }

    #[test]
    fn test_display_uses_description() {
        let revoked = CoreEvent::Integrity(IntegrityEvent::Revoked {
            version_name: "1.0.0".to_string(),
            version_code: 1,
        });
        assert_eq!(revoked.to_string(), "Build revoked");

        let transition = state_changed(PlaybackStatus::Playing, PlaybackStatus::Paused);
        assert_eq!(transition.to_string(), "Playback state changed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Service(ServiceEvent::Started {
            mode: StartMode::Foreground,
            instance_id: "svc-1".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Service\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        bus.emit(CoreEvent::Connection(ConnectionEvent::Connecting))
                            .ok();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.ok();
        }

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
