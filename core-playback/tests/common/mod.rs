//! Stateful fakes shared by the playback integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::{DesktopAudioFocus, DesktopForegroundHost};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{
    EngineEvent, EngineEventStream, PlaybackAdapter, PlaybackRequest, PlaybackSessionId,
    PlaybackStatus,
};
use bridge_traits::{CatalogClient, PlayableTrack};
use core_playback::{ControllerHandle, PlaybackSnapshot, ServiceContext};
use core_runtime::config::PlaybackConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};

// ============================================================================
// Engine
// ============================================================================

/// Engine that prepares instantly and lets the test raise callbacks.
pub struct ScriptedEngine {
    sender: mpsc::UnboundedSender<EngineEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
    last_session: Mutex<Option<PlaybackSessionId>>,
    unloaded: Mutex<Vec<PlaybackSessionId>>,
    prepared_tracks: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            last_session: Mutex::new(None),
            unloaded: Mutex::new(Vec::new()),
            prepared_tracks: Mutex::new(Vec::new()),
        })
    }

    /// Report natural completion of the most recently prepared session.
    pub fn complete_current(&self) {
        if let Some(session) = *self.last_session.lock() {
            let _ = self.sender.send(EngineEvent::Completed { session });
        }
    }

    /// Report a late failure of the most recently prepared session.
    pub fn fail_current(&self, message: &str) {
        if let Some(session) = *self.last_session.lock() {
            let _ = self.sender.send(EngineEvent::Failed {
                session,
                message: message.to_string(),
            });
        }
    }

    pub fn unloaded(&self) -> Vec<PlaybackSessionId> {
        self.unloaded.lock().clone()
    }

    pub fn prepared_tracks(&self) -> Vec<String> {
        self.prepared_tracks.lock().clone()
    }
}

struct ChannelEvents(mpsc::UnboundedReceiver<EngineEvent>);

#[async_trait]
impl EngineEventStream for ChannelEvents {
    async fn next(&mut self) -> Option<EngineEvent> {
        self.0.recv().await
    }
}

#[async_trait]
impl PlaybackAdapter for ScriptedEngine {
    async fn prepare(&self, request: PlaybackRequest) -> BridgeResult<PlaybackSessionId> {
        let session = PlaybackSessionId::new();
        *self.last_session.lock() = Some(session);
        if let Some(track_id) = request.metadata.track_id {
            self.prepared_tracks.lock().push(track_id);
        }
        Ok(session)
    }

    async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn stop(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, _session: PlaybackSessionId, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        Ok(Duration::from_millis(1500))
    }

    async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.unloaded.lock().push(session);
        Ok(())
    }

    async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
        match self.receiver.lock().take() {
            Some(receiver) => Ok(Box::new(ChannelEvents(receiver))),
            None => Err(BridgeError::NotAvailable(
                "engine events already subscribed".to_string(),
            )),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Catalog with per-track failures and delays.
#[derive(Default)]
pub struct ScriptedCatalog {
    broken: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    resolved: Mutex<Vec<String>>,
}

impl ScriptedCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn break_track(&self, track_id: &str) {
        self.broken.lock().insert(track_id.to_string());
    }

    pub fn delay_track(&self, track_id: &str, delay: Duration) {
        self.delays.lock().insert(track_id.to_string(), delay);
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().clone()
    }
}

#[async_trait]
impl CatalogClient for ScriptedCatalog {
    async fn resolve(&self, track_id: &str) -> BridgeResult<PlayableTrack> {
        self.resolved.lock().push(track_id.to_string());

        let delay = self.delays.lock().get(track_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.broken.lock().contains(track_id) {
            return Err(BridgeError::OperationFailed(format!(
                "catalog has no stream for {}",
                track_id
            )));
        }

        Ok(PlayableTrack::new(
            track_id,
            format!("Song {}", track_id),
            format!("https://cdn.example.com/{}.mp3", track_id),
        ))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: Arc<ScriptedEngine>,
    pub catalog: Arc<ScriptedCatalog>,
    pub foreground: Arc<DesktopForegroundHost>,
    pub focus: Arc<DesktopAudioFocus>,
    pub events: EventBus,
    pub ctx: ServiceContext,
}

impl Harness {
    /// Android-like host (API 34) so the foreground path is exercised.
    pub fn new() -> Self {
        Self::with_api_level(34)
    }

    pub fn with_api_level(api_level: u32) -> Self {
        let engine = ScriptedEngine::new();
        let catalog = ScriptedCatalog::new();
        let foreground = Arc::new(DesktopForegroundHost::with_api_level(api_level));
        let focus = Arc::new(DesktopAudioFocus::new());
        let events = EventBus::new(4096);

        let ctx = ServiceContext {
            adapter: engine.clone(),
            catalog: catalog.clone(),
            foreground: foreground.clone(),
            audio_focus: focus.clone(),
            events: events.clone(),
            config: PlaybackConfig::default(),
            emit_position_events: false,
        };

        Self {
            engine,
            catalog,
            foreground,
            focus,
            events,
            ctx,
        }
    }
}

/// Wait until a published snapshot satisfies `predicate`.
pub async fn wait_for(
    updates: &mut watch::Receiver<PlaybackSnapshot>,
    predicate: impl Fn(&PlaybackSnapshot) -> bool,
) -> PlaybackSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = updates.borrow_and_update();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }
            updates.changed().await.expect("service alive");
        }
    })
    .await
    .expect("snapshot condition reached in time")
}

pub async fn wait_for_status(
    controller: &ControllerHandle,
    status: PlaybackStatus,
) -> PlaybackSnapshot {
    let mut updates = controller.subscribe().expect("controller alive");
    wait_for(&mut updates, |s| s.status == status).await
}

/// Drain every buffered event.
pub fn drain(events: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// `(from, to)` pairs of every state change in `events`.
pub fn transitions(events: &[CoreEvent]) -> Vec<(PlaybackStatus, PlaybackStatus)> {
    events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Playback(PlaybackEvent::StateChanged { from, to, .. }) => Some((*from, *to)),
            _ => None,
        })
        .collect()
}
