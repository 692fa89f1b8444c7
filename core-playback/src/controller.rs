//! # Controller Handle
//!
//! The capability a bound client uses to drive the playback service.
//!
//! A [`ControllerHandle`] is cheap to clone and safe to keep around: once the
//! owning service instance is destroyed every call returns
//! [`PlaybackError::ServiceUnavailable`] instead of reaching a dead actor.
//! Commands travel through the service's single command queue and are
//! acknowledged only after the actor applied them, so a `snapshot()` taken
//! right after an awaited command already reflects it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::catalog::PlayableTrack;
use bridge_traits::playback::{EngineEvent, PlaybackSessionId};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{PlaybackError, Result};
use crate::types::{PlayRequest, PlaybackSnapshot, RepeatMode, ServiceInstanceId, SkipDirection};

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Messages consumed by the service actor.
pub(crate) enum ServiceCommand {
    Play {
        request: PlayRequest,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Skip {
        direction: SkipDirection,
        reply: Reply<()>,
    },
    Seek {
        position: Duration,
        reply: Reply<()>,
    },
    SetRepeatMode {
        mode: RepeatMode,
        reply: Reply<()>,
    },
    SetShuffle {
        enabled: bool,
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Reset {
        reply: Reply<()>,
    },
    Position {
        reply: Reply<Duration>,
    },
    PrepareFinished {
        generation: u64,
        track_id: String,
        outcome: Result<(PlaybackSessionId, PlayableTrack)>,
    },
    Engine(EngineEvent),
    Tick,
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Liveness-checked handle to one playback service instance.
///
/// Equality is identity of the owning instance.
#[derive(Clone)]
pub struct ControllerHandle {
    instance_id: ServiceInstanceId,
    commands: mpsc::Sender<ServiceCommand>,
    alive: Arc<AtomicBool>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
}

impl ControllerHandle {
    pub(crate) fn new(
        instance_id: ServiceInstanceId,
        commands: mpsc::Sender<ServiceCommand>,
        alive: Arc<AtomicBool>,
        snapshots: watch::Receiver<PlaybackSnapshot>,
    ) -> Self {
        Self {
            instance_id,
            commands,
            alive,
            snapshots,
        }
    }

    pub fn instance_id(&self) -> ServiceInstanceId {
        self.instance_id
    }

    /// `false` once the owning service has been destroyed.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Start a single track or a queue.
    ///
    /// Returns once the service entered `Preparing`; the transition to
    /// `Playing` (or `Error`) is observable through [`subscribe`](Self::subscribe).
    pub async fn play(&self, request: PlayRequest) -> Result<()> {
        self.request(|reply| ServiceCommand::Play { request, reply })
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| ServiceCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| ServiceCommand::Resume { reply }).await
    }

    pub async fn skip(&self, direction: SkipDirection) -> Result<()> {
        self.request(|reply| ServiceCommand::Skip { direction, reply })
            .await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|reply| ServiceCommand::Seek { position, reply })
            .await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.request(|reply| ServiceCommand::SetRepeatMode { mode, reply })
            .await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<()> {
        self.request(|reply| ServiceCommand::SetShuffle { enabled, reply })
            .await
    }

    /// Stop playback and drop foreground status. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| ServiceCommand::Stop { reply }).await
    }

    /// Leave `Error` for `Idle`.
    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| ServiceCommand::Reset { reply }).await
    }

    /// Engine-reported position of the loaded track, or the last known one.
    pub async fn position(&self) -> Result<Duration> {
        self.request(|reply| ServiceCommand::Position { reply })
            .await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Result<PlaybackSnapshot> {
        self.ensure_alive()?;
        Ok(self.snapshots.borrow().clone())
    }

    /// Watch every snapshot the service publishes from now on.
    pub fn subscribe(&self) -> Result<watch::Receiver<PlaybackSnapshot>> {
        self.ensure_alive()?;
        Ok(self.snapshots.clone())
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(PlaybackError::ServiceUnavailable)
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> ServiceCommand) -> Result<T> {
        self.ensure_alive()?;

        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| PlaybackError::ServiceUnavailable)?;

        response
            .await
            .map_err(|_| PlaybackError::ServiceUnavailable)?
    }
}

impl PartialEq for ControllerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for ControllerHandle {}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("instance_id", &self.instance_id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_handle() -> (ControllerHandle, mpsc::Receiver<ServiceCommand>, Arc<AtomicBool>) {
        let id = ServiceInstanceId::new();
        let (tx, rx) = mpsc::channel(4);
        let alive = Arc::new(AtomicBool::new(true));
        let (_snap_tx, snap_rx) = watch::channel(PlaybackSnapshot::initial(id));
        (
            ControllerHandle::new(id, tx, Arc::clone(&alive), snap_rx),
            rx,
            alive,
        )
    }

    #[tokio::test]
    async fn test_invalidated_handle_returns_service_unavailable() {
        let (handle, _rx, alive) = detached_handle();
        alive.store(false, Ordering::Release);

        assert!(matches!(
            handle.pause().await,
            Err(PlaybackError::ServiceUnavailable)
        ));
        assert!(matches!(
            handle.snapshot(),
            Err(PlaybackError::ServiceUnavailable)
        ));
        assert!(handle.subscribe().is_err());
    }

    #[tokio::test]
    async fn test_dropped_actor_returns_service_unavailable() {
        let (handle, rx, _alive) = detached_handle();
        drop(rx);

        assert!(matches!(
            handle.stop().await,
            Err(PlaybackError::ServiceUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_command_is_acknowledged() {
        let (handle, mut rx, _alive) = detached_handle();

        let actor = tokio::spawn(async move {
            if let Some(ServiceCommand::Seek { position, reply }) = rx.recv().await {
                assert_eq!(position, Duration::from_secs(12));
                let _ = reply.send(Ok(()));
            }
        });

        handle.seek(Duration::from_secs(12)).await.unwrap();
        actor.await.unwrap();
    }

    #[test]
    fn test_equality_is_instance_identity() {
        let (a, _rx_a, _) = detached_handle();
        let (b, _rx_b, _) = detached_handle();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
