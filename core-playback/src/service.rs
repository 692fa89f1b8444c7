//! # Playback Service
//!
//! Owns the native engine session, the play queue and the foreground
//! notification for as long as the hosting process keeps the service alive.
//!
//! ## Architecture
//!
//! One actor task owns every piece of mutable playback state. Client commands
//! (through [`ControllerHandle`]), engine callbacks and the results of
//! background Preparing work all arrive on the same command queue, so they are
//! applied strictly one at a time in arrival order.
//!
//! ```text
//! ControllerHandle ──┐
//! engine events ─────┼──▶ mpsc ──▶ ServiceActor ──▶ watch<PlaybackSnapshot>
//! prepare tasks ─────┘                  │
//!                                       ├──▶ PlaybackAdapter / AudioFocus
//!                                       ├──▶ ForegroundHost (notification)
//!                                       └──▶ EventBus (PlaybackEvent)
//! ```
//!
//! Preparing (catalog resolve, engine prepare, engine play) runs in a spawned
//! task tagged with a generation number; a result whose generation is no
//! longer current is discarded and its session released.
//!
//! ## Foreground timing
//!
//! With [`StartMode::Foreground`], [`PlaybackService::start`] calls
//! [`ForegroundHost::start_foreground`] synchronously before anything else,
//! so the notification is visible well within
//! [`PlaybackConfig::foreground_window`] of the start call. Missing the
//! platform deadline is fatal and cannot be recovered from here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bridge_traits::catalog::{CatalogClient, PlayableTrack};
use bridge_traits::foreground::{ForegroundHost, NotificationDescriptor, StartMode};
use bridge_traits::playback::{
    AudioFocus, AudioSource, EngineEvent, EngineEventStream, PlaybackAdapter, PlaybackMetadata,
    PlaybackRequest, PlaybackSessionId, PlaybackStatus,
};
use core_runtime::config::{CoreConfig, PlaybackConfig};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, ServiceEvent};
use rand::seq::SliceRandom;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace, warn};

use crate::controller::{ControllerHandle, ServiceCommand};
use crate::error::{PlaybackError, Result};
use crate::types::{
    PlayRequest, PlaybackFailure, PlaybackSnapshot, RepeatMode, ServiceInstanceId, SkipDirection,
};

/// Everything a service instance needs from the outside world.
///
/// The host keeps one context and starts a fresh service from it each time
/// the previous instance was destroyed.
#[derive(Clone)]
pub struct ServiceContext {
    pub adapter: Arc<dyn PlaybackAdapter>,
    pub catalog: Arc<dyn CatalogClient>,
    pub foreground: Arc<dyn ForegroundHost>,
    pub audio_focus: Arc<dyn AudioFocus>,
    pub events: EventBus,
    pub config: PlaybackConfig,
    pub emit_position_events: bool,
}

impl ServiceContext {
    pub fn from_config(config: &CoreConfig, events: EventBus) -> Self {
        Self {
            adapter: Arc::clone(&config.playback_adapter),
            catalog: Arc::clone(&config.catalog_client),
            foreground: Arc::clone(&config.foreground_host),
            audio_focus: Arc::clone(&config.audio_focus),
            events,
            config: config.playback.clone(),
            emit_position_events: config.features.emit_position_events,
        }
    }

    /// Start mode mandated by the host API level.
    pub fn start_mode(&self) -> StartMode {
        StartMode::for_api_level(self.foreground.api_level())
    }
}

/// A running playback service instance.
pub struct PlaybackService {
    instance_id: ServiceInstanceId,
    mode: StartMode,
    controller: ControllerHandle,
    alive: Arc<AtomicBool>,
    commands: mpsc::Sender<ServiceCommand>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    actor: JoinHandle<()>,
    helpers: Vec<JoinHandle<()>>,
    promotion_latency: Option<Duration>,
    events: EventBus,
}

impl PlaybackService {
    /// Start a new instance.
    ///
    /// # Postcondition
    ///
    /// With [`StartMode::Foreground`] the foreground notification has been
    /// posted before this returns, and within `foreground_window` of the call.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::ForegroundPromotion`] if the host refuses promotion.
    #[instrument(skip(ctx))]
    pub async fn start(ctx: ServiceContext, mode: StartMode) -> Result<Self> {
        let started_at = Instant::now();
        let instance_id = ServiceInstanceId::new();

        let promotion_latency = if mode == StartMode::Foreground {
            ctx.foreground
                .start_foreground(build_notification(&ctx.config, PlaybackStatus::Idle, None))
                .map_err(|err| PlaybackError::ForegroundPromotion(err.to_string()))?;

            let latency = started_at.elapsed();
            if latency > ctx.config.foreground_window {
                warn!(
                    ?latency,
                    window = ?ctx.config.foreground_window,
                    "Foreground promotion exceeded its window"
                );
            }
            Some(latency)
        } else {
            None
        };

        let engine_events = match ctx.adapter.subscribe_events().await {
            Ok(stream) => Some(stream),
            Err(err) => {
                warn!(error = %err, "Engine events unavailable; completions will not advance the queue");
                None
            }
        };

        let (commands, receiver) = mpsc::channel(ctx.config.command_buffer);
        let (snapshot_tx, snapshots) = watch::channel(PlaybackSnapshot::initial(instance_id));
        let alive = Arc::new(AtomicBool::new(true));
        let controller = ControllerHandle::new(
            instance_id,
            commands.clone(),
            Arc::clone(&alive),
            snapshots.clone(),
        );

        let mut helpers = Vec::new();
        if let Some(stream) = engine_events {
            helpers.push(tokio::spawn(forward_engine_events(
                stream,
                commands.downgrade(),
            )));
        }
        if ctx.emit_position_events {
            helpers.push(tokio::spawn(tick_positions(
                ctx.config.position_interval,
                commands.downgrade(),
            )));
        }

        let events = ctx.events.clone();
        let actor = ServiceActor::new(ctx, instance_id, mode, commands.downgrade(), snapshot_tx);
        let actor = tokio::spawn(actor.run(receiver));

        let _ = events.emit(CoreEvent::Service(ServiceEvent::Started {
            mode,
            instance_id: instance_id.to_string(),
        }));
        info!(%instance_id, ?mode, "Playback service started");

        Ok(Self {
            instance_id,
            mode,
            controller,
            alive,
            commands,
            snapshots,
            actor,
            helpers,
            promotion_latency,
            events,
        })
    }

    pub fn instance_id(&self) -> ServiceInstanceId {
        self.instance_id
    }

    pub fn mode(&self) -> StartMode {
        self.mode
    }

    /// A new handle to this instance.
    pub fn controller(&self) -> ControllerHandle {
        self.controller.clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Preparing or Playing. An active service is not destroyed when its
    /// last client unbinds.
    pub fn is_active(&self) -> bool {
        self.snapshots.borrow().status.is_active()
    }

    /// Time from the start call to the foreground notification being posted.
    pub fn promotion_latency(&self) -> Option<Duration> {
        self.promotion_latency
    }

    /// Make every outstanding [`ControllerHandle`] return
    /// [`PlaybackError::ServiceUnavailable`].
    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Invalidate handles, release the engine, focus and notification, and
    /// wait for the actor to exit.
    pub async fn shutdown(self) {
        self.invalidate();

        let (done, finished) = oneshot::channel();
        if self
            .commands
            .send(ServiceCommand::Shutdown { done })
            .await
            .is_ok()
        {
            let _ = finished.await;
        }

        for helper in &self.helpers {
            helper.abort();
        }
        if let Err(err) = self.actor.await {
            warn!(error = %err, "Playback service actor ended abnormally");
        }

        let _ = self
            .events
            .emit(CoreEvent::Service(ServiceEvent::Destroyed {
                instance_id: self.instance_id.to_string(),
            }));
        info!(instance_id = %self.instance_id, "Playback service destroyed");
    }
}

impl std::fmt::Debug for PlaybackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackService")
            .field("instance_id", &self.instance_id)
            .field("mode", &self.mode)
            .field("status", &self.snapshots.borrow().status)
            .finish()
    }
}

async fn forward_engine_events(
    mut stream: Box<dyn EngineEventStream>,
    commands: mpsc::WeakSender<ServiceCommand>,
) {
    while let Some(event) = stream.next().await {
        let Some(sender) = commands.upgrade() else {
            break;
        };
        if sender.send(ServiceCommand::Engine(event)).await.is_err() {
            break;
        }
    }
    debug!("Engine event forwarder stopped");
}

async fn tick_positions(period: Duration, commands: mpsc::WeakSender<ServiceCommand>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(sender) = commands.upgrade() else {
            break;
        };
        match sender.try_send(ServiceCommand::Tick) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Closed(_)) => break,
        }
    }
}

async fn prepare_track(
    catalog: Arc<dyn CatalogClient>,
    adapter: Arc<dyn PlaybackAdapter>,
    track_id: &str,
) -> Result<(PlaybackSessionId, PlayableTrack)> {
    let track = catalog
        .resolve(track_id)
        .await
        .map_err(|err| PlaybackError::Catalog {
            track_id: track_id.to_string(),
            message: err.to_string(),
        })?;

    let request = PlaybackRequest::new(AudioSource::remote(track.stream_url.clone()))
        .with_metadata(PlaybackMetadata {
            track_id: Some(track.track_id.clone()),
            title: Some(track.title.clone()),
            artist: track.artist.clone(),
            duration: track.duration,
        });

    let session = adapter
        .prepare(request)
        .await
        .map_err(|err| PlaybackError::Engine(err.to_string()))?;

    if let Err(err) = adapter.play(session).await {
        if let Err(unload_err) = adapter.unload(session).await {
            warn!(error = %unload_err, "Failed to unload session after play failure");
        }
        return Err(PlaybackError::Engine(err.to_string()));
    }

    Ok((session, track))
}

fn build_notification(
    config: &PlaybackConfig,
    status: PlaybackStatus,
    title: Option<&str>,
) -> NotificationDescriptor {
    let text = match status {
        PlaybackStatus::Idle => "Ready",
        PlaybackStatus::Preparing => "Loading",
        PlaybackStatus::Playing => "Playing",
        PlaybackStatus::Paused => "Paused",
        PlaybackStatus::Stopped => "Stopped",
        PlaybackStatus::Error => "Playback failed",
    };

    NotificationDescriptor::new(&config.notification_channel, title.unwrap_or("Nothing playing"))
        .with_text(text)
        .with_playing(status == PlaybackStatus::Playing)
}

struct ServiceActor {
    ctx: ServiceContext,
    instance_id: ServiceInstanceId,
    mode: StartMode,
    /// Whether the host currently shows us as a foreground service.
    promoted: bool,
    commands: mpsc::WeakSender<ServiceCommand>,
    snapshots: watch::Sender<PlaybackSnapshot>,

    status: PlaybackStatus,
    queue: Vec<String>,
    /// Play order as indices into `queue`; identity unless shuffled.
    order: Vec<usize>,
    /// Position in `order`.
    cursor: Option<usize>,
    repeat_mode: RepeatMode,
    shuffle: bool,
    current_track: Option<String>,
    current_title: Option<String>,
    session: Option<PlaybackSessionId>,
    generation: u64,
    position: Duration,

    last_failure: Option<PlaybackFailure>,
    /// Distinct tracks that failed since the last successful start.
    failed_tracks: Vec<String>,
    consecutive_failures: u32,

    revision: u64,
    focus_held: bool,
}

impl ServiceActor {
    fn new(
        ctx: ServiceContext,
        instance_id: ServiceInstanceId,
        mode: StartMode,
        commands: mpsc::WeakSender<ServiceCommand>,
        snapshots: watch::Sender<PlaybackSnapshot>,
    ) -> Self {
        Self {
            ctx,
            instance_id,
            mode,
            promoted: mode == StartMode::Foreground,
            commands,
            snapshots,
            status: PlaybackStatus::Idle,
            queue: Vec::new(),
            order: Vec::new(),
            cursor: None,
            repeat_mode: RepeatMode::Off,
            shuffle: false,
            current_track: None,
            current_title: None,
            session: None,
            generation: 0,
            position: Duration::ZERO,
            last_failure: None,
            failed_tracks: Vec::new(),
            consecutive_failures: 0,
            revision: 0,
            focus_held: false,
        }
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<ServiceCommand>) {
        while let Some(command) = receiver.recv().await {
            match command {
                ServiceCommand::Play { request, reply } => {
                    let result = self.play(request).await;
                    let _ = reply.send(result);
                }
                ServiceCommand::Pause { reply } => {
                    let result = self.pause().await;
                    let _ = reply.send(result);
                }
                ServiceCommand::Resume { reply } => {
                    let result = self.resume().await;
                    let _ = reply.send(result);
                }
                ServiceCommand::Skip { direction, reply } => {
                    let result = self.skip(direction).await;
                    let _ = reply.send(result);
                }
                ServiceCommand::Seek { position, reply } => {
                    let result = self.seek(position).await;
                    let _ = reply.send(result);
                }
                ServiceCommand::SetRepeatMode { mode, reply } => {
                    self.repeat_mode = mode;
                    self.publish();
                    let _ = reply.send(Ok(()));
                }
                ServiceCommand::SetShuffle { enabled, reply } => {
                    self.set_shuffle(enabled);
                    let _ = reply.send(Ok(()));
                }
                ServiceCommand::Stop { reply } => {
                    self.stop().await;
                    let _ = reply.send(Ok(()));
                }
                ServiceCommand::Reset { reply } => {
                    let result = self.reset().await;
                    let _ = reply.send(result);
                }
                ServiceCommand::Position { reply } => {
                    let result = self.query_position().await;
                    let _ = reply.send(result);
                }
                ServiceCommand::PrepareFinished {
                    generation,
                    track_id,
                    outcome,
                } => self.on_prepare_finished(generation, track_id, outcome).await,
                ServiceCommand::Engine(event) => self.on_engine_event(event).await,
                ServiceCommand::Tick => self.on_tick().await,
                ServiceCommand::Shutdown { done } => {
                    self.release().await;
                    let _ = done.send(());
                    break;
                }
            }
        }
        debug!(instance_id = %self.instance_id, "Playback service actor exited");
    }

    // ------------------------------------------------------------------
    // Client commands
    // ------------------------------------------------------------------

    async fn play(&mut self, request: PlayRequest) -> Result<()> {
        if request.queue.is_empty() {
            return Err(PlaybackError::invalid("play", self.status, "queue is empty"));
        }
        if request.start_index >= request.queue.len() {
            return Err(PlaybackError::invalid(
                "play",
                self.status,
                format!(
                    "start index {} out of range for {} tracks",
                    request.start_index,
                    request.queue.len()
                ),
            ));
        }

        debug!(tracks = request.queue.len(), start = request.start_index, "play");
        self.clear_failures();
        if self.status == PlaybackStatus::Error {
            self.transition(PlaybackStatus::Idle).await;
        }

        self.queue = request.queue;
        let (order, cursor) = self.build_order(request.start_index);
        self.order = order;
        self.prepare_at(cursor).await;
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        if self.status != PlaybackStatus::Playing {
            return Err(PlaybackError::invalid("pause", self.status, "nothing is playing"));
        }
        let session = self.loaded_session("pause")?;

        self.ctx.adapter.pause(session).await?;
        if let Ok(position) = self.ctx.adapter.get_position(session).await {
            self.position = position;
        }
        self.transition(PlaybackStatus::Paused).await;
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        if self.status != PlaybackStatus::Paused {
            return Err(PlaybackError::invalid("resume", self.status, "playback is not paused"));
        }
        let session = self.loaded_session("resume")?;

        self.ctx.adapter.play(session).await?;
        self.transition(PlaybackStatus::Playing).await;
        Ok(())
    }

    async fn skip(&mut self, direction: SkipDirection) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::invalid("skip", self.status, "queue is empty"));
        }

        let cursor = self.cursor.unwrap_or(0);
        let target = match direction {
            SkipDirection::Next => self
                .advance(cursor, self.repeat_mode == RepeatMode::All)
                .ok_or_else(|| PlaybackError::invalid("skip", self.status, "end of queue"))?,
            SkipDirection::Previous => {
                if cursor > 0 {
                    cursor - 1
                } else if self.repeat_mode == RepeatMode::All {
                    self.order.len() - 1
                } else {
                    cursor
                }
            }
        };

        debug!(?direction, target, "skip");
        self.clear_failures();
        if self.status == PlaybackStatus::Error {
            self.transition(PlaybackStatus::Idle).await;
        }
        self.prepare_at(target).await;
        Ok(())
    }

    async fn seek(&mut self, position: Duration) -> Result<()> {
        if !self.status.has_loaded_track() {
            return Err(PlaybackError::invalid("seek", self.status, "no track loaded"));
        }
        let session = self.loaded_session("seek")?;

        self.ctx.adapter.seek(session, position).await?;
        self.position = position;
        self.publish();
        Ok(())
    }

    fn set_shuffle(&mut self, enabled: bool) {
        if self.shuffle == enabled {
            return;
        }
        self.shuffle = enabled;

        if let Some(current) = self.cursor.and_then(|c| self.order.get(c).copied()) {
            let (order, cursor) = self.build_order(current);
            self.order = order;
            self.cursor = Some(cursor);
        }
        self.publish();
    }

    async fn stop(&mut self) {
        if self.status == PlaybackStatus::Stopped {
            return;
        }
        debug!("stop");
        self.generation += 1;
        self.release_session().await;
        self.transition(PlaybackStatus::Stopped).await;
    }

    async fn reset(&mut self) -> Result<()> {
        match self.status {
            PlaybackStatus::Error => {
                self.clear_failures();
                self.transition(PlaybackStatus::Idle).await;
                Ok(())
            }
            PlaybackStatus::Idle => Ok(()),
            status => Err(PlaybackError::invalid(
                "reset",
                status,
                "only a failed session can be reset",
            )),
        }
    }

    async fn query_position(&mut self) -> Result<Duration> {
        match self.session {
            Some(session) if self.status.has_loaded_track() => {
                self.position = self.ctx.adapter.get_position(session).await?;
                Ok(self.position)
            }
            _ => Ok(self.position),
        }
    }

    // ------------------------------------------------------------------
    // Asynchronous completions
    // ------------------------------------------------------------------

    async fn on_prepare_finished(
        &mut self,
        generation: u64,
        track_id: String,
        outcome: Result<(PlaybackSessionId, PlayableTrack)>,
    ) {
        if generation != self.generation || self.status != PlaybackStatus::Preparing {
            debug!(generation, current = self.generation, %track_id, "Discarding stale prepare result");
            if let Ok((session, _)) = outcome {
                self.discard_session(session).await;
            }
            return;
        }

        match outcome {
            Ok((session, track)) => {
                self.session = Some(session);
                self.current_title = Some(track.title);
                self.clear_failures();
                self.transition(PlaybackStatus::Playing).await;
            }
            Err(err) => self.on_prepare_failed(track_id, err).await,
        }
    }

    async fn on_prepare_failed(&mut self, track_id: String, err: PlaybackError) {
        self.consecutive_failures += 1;
        if !self.failed_tracks.contains(&track_id) {
            self.failed_tracks.push(track_id.clone());
        }
        warn!(
            %track_id,
            error = %err,
            consecutive_failures = self.consecutive_failures,
            "Preparing failed"
        );

        self.last_failure = Some(PlaybackFailure {
            track_id: track_id.clone(),
            message: err.to_string(),
        });
        self.current_track = None;
        self.current_title = None;
        self.transition(PlaybackStatus::Error).await;
        self.emit(PlaybackEvent::TrackFailed {
            track_id: track_id.clone(),
            message: err.to_string(),
            consecutive_failures: self.consecutive_failures,
        });

        if self.failed_tracks.len() as u32 >= self.ctx.config.max_consecutive_failures {
            warn!(
                consecutive_failures = self.consecutive_failures,
                "Too many consecutive failures, stopping queue"
            );
            self.generation += 1;
            self.transition(PlaybackStatus::Stopped).await;
            self.emit(PlaybackEvent::QueueStopped {
                consecutive_failures: self.consecutive_failures,
            });
            return;
        }

        // Never loop back onto a track that already failed in this streak.
        let next = self
            .cursor
            .and_then(|c| self.advance(c, self.repeat_mode == RepeatMode::All))
            .filter(|&c| {
                self.track_at(c)
                    .map_or(false, |id| !self.failed_tracks.contains(&id))
            });

        match next {
            Some(cursor) => {
                self.transition(PlaybackStatus::Idle).await;
                self.prepare_at(cursor).await;
            }
            None => debug!("No untried track left; staying in error"),
        }
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        if self.session != Some(event.session()) {
            trace!("Ignoring engine event for a released session");
            return;
        }

        match event {
            EngineEvent::Completed { session } => {
                debug!("Track completed");
                self.discard_session(session).await;
                self.session = None;

                let next = match self.repeat_mode {
                    RepeatMode::One => self.cursor,
                    RepeatMode::All => self.cursor.and_then(|c| self.advance(c, true)),
                    RepeatMode::Off => self.cursor.and_then(|c| self.advance(c, false)),
                };

                match next {
                    Some(cursor) => self.prepare_at(cursor).await,
                    None => {
                        self.generation += 1;
                        self.transition(PlaybackStatus::Stopped).await;
                    }
                }
            }
            EngineEvent::Failed { session, message } => {
                if !self.status.has_loaded_track() {
                    return;
                }
                let track_id = self.current_track.take().unwrap_or_default();
                warn!(%track_id, %message, "Engine failed during playback");

                self.discard_session(session).await;
                self.session = None;
                self.generation += 1;
                self.current_title = None;
                self.last_failure = Some(PlaybackFailure {
                    track_id: track_id.clone(),
                    message: message.clone(),
                });
                self.transition(PlaybackStatus::Error).await;
                self.emit(PlaybackEvent::TrackFailed {
                    track_id,
                    message,
                    consecutive_failures: self.consecutive_failures,
                });
            }
        }
    }

    async fn on_tick(&mut self) {
        let (Some(session), Some(track_id)) = (self.session, self.current_track.clone()) else {
            return;
        };
        if self.status != PlaybackStatus::Playing {
            return;
        }

        match self.ctx.adapter.get_position(session).await {
            Ok(position) => {
                self.position = position;
                self.emit(PlaybackEvent::PositionChanged {
                    track_id,
                    position_ms: position.as_millis() as u64,
                });
                self.publish();
            }
            Err(err) => trace!(error = %err, "Position query failed"),
        }
    }

    // ------------------------------------------------------------------
    // Queue helpers
    // ------------------------------------------------------------------

    /// Play order for the current queue plus the cursor of `start`.
    fn build_order(&self, start: usize) -> (Vec<usize>, usize) {
        if !self.shuffle {
            return ((0..self.queue.len()).collect(), start);
        }

        let mut rest: Vec<usize> = (0..self.queue.len()).filter(|&i| i != start).collect();
        rest.shuffle(&mut rand::thread_rng());

        let mut order = Vec::with_capacity(self.queue.len());
        order.push(start);
        order.extend(rest);
        (order, 0)
    }

    fn advance(&self, cursor: usize, wrap: bool) -> Option<usize> {
        if cursor + 1 < self.order.len() {
            Some(cursor + 1)
        } else if wrap && !self.order.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    fn track_at(&self, cursor: usize) -> Option<String> {
        self.order
            .get(cursor)
            .and_then(|&index| self.queue.get(index))
            .cloned()
    }

    async fn prepare_at(&mut self, cursor: usize) {
        let Some(track_id) = self.track_at(cursor) else {
            warn!(cursor, "Queue cursor out of range");
            return;
        };
        self.cursor = Some(cursor);
        self.release_session().await;

        self.generation += 1;
        let generation = self.generation;
        self.current_track = Some(track_id.clone());
        self.current_title = None;
        self.position = Duration::ZERO;
        self.transition(PlaybackStatus::Preparing).await;

        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let catalog = Arc::clone(&self.ctx.catalog);
        let adapter = Arc::clone(&self.ctx.adapter);
        tokio::spawn(async move {
            let outcome = prepare_track(catalog, adapter, &track_id).await;
            let _ = commands
                .send(ServiceCommand::PrepareFinished {
                    generation,
                    track_id,
                    outcome,
                })
                .await;
        });
    }

    fn clear_failures(&mut self) {
        self.last_failure = None;
        self.failed_tracks.clear();
        self.consecutive_failures = 0;
    }

    fn loaded_session(&self, command: &'static str) -> Result<PlaybackSessionId> {
        self.session
            .ok_or_else(|| PlaybackError::invalid(command, self.status, "no track loaded"))
    }

    // ------------------------------------------------------------------
    // Transitions and side effects
    // ------------------------------------------------------------------

    async fn transition(&mut self, to: PlaybackStatus) {
        let from = self.status;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "Refusing invalid transition");
            return;
        }

        self.status = to;
        debug!(%from, %to, track_id = ?self.current_track, "Playback state changed");
        self.emit(PlaybackEvent::StateChanged {
            from,
            to,
            track_id: self.current_track.clone(),
        });
        self.publish();

        self.sync_audio_focus(to).await;
        self.sync_notification(to).await;
    }

    /// Focus is held from Playing through any Preparing that follows it
    /// (skip, repeat) and released on every other state.
    async fn sync_audio_focus(&mut self, to: PlaybackStatus) {
        match to {
            PlaybackStatus::Playing if !self.focus_held => {
                match self.ctx.audio_focus.request_focus().await {
                    Ok(true) => self.focus_held = true,
                    Ok(false) => warn!("Audio focus denied"),
                    Err(err) => warn!(error = %err, "Audio focus request failed"),
                }
            }
            PlaybackStatus::Playing | PlaybackStatus::Preparing => {}
            _ if self.focus_held => self.abandon_focus().await,
            _ => {}
        }
    }

    async fn abandon_focus(&mut self) {
        if let Err(err) = self.ctx.audio_focus.abandon_focus().await {
            warn!(error = %err, "Failed to abandon audio focus");
        }
        self.focus_held = false;
    }

    async fn sync_notification(&mut self, to: PlaybackStatus) {
        if to == PlaybackStatus::Stopped {
            self.remove_notification().await;
            return;
        }

        let notification =
            build_notification(&self.ctx.config, to, self.notification_title().as_deref());

        if self.mode == StartMode::Foreground && !self.promoted && to.is_active() {
            match self.ctx.foreground.start_foreground(notification) {
                Ok(()) => self.promoted = true,
                Err(err) => warn!(error = %err, "Foreground promotion failed"),
            }
        } else if let Err(err) = self.ctx.foreground.update_notification(notification).await {
            warn!(error = %err, "Failed to update playback notification");
        }
    }

    async fn remove_notification(&mut self) {
        if let Err(err) = self.ctx.foreground.stop_foreground(true).await {
            warn!(error = %err, "Failed to remove playback notification");
        }
        self.promoted = false;
    }

    fn notification_title(&self) -> Option<String> {
        self.current_title
            .clone()
            .or_else(|| self.current_track.clone())
    }

    fn publish(&mut self) {
        self.revision += 1;
        let snapshot = PlaybackSnapshot {
            instance_id: self.instance_id,
            status: self.status,
            current_track: self.current_track.clone(),
            position: self.position,
            queue: self.queue.clone(),
            queue_index: self.cursor.and_then(|c| self.order.get(c).copied()),
            repeat_mode: self.repeat_mode,
            shuffle: self.shuffle,
            last_failure: self.last_failure.clone(),
            consecutive_failures: self.consecutive_failures,
            revision: self.revision,
        };
        self.snapshots.send_replace(snapshot);
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.ctx.events.emit(CoreEvent::Playback(event));
    }

    async fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.discard_session(session).await;
        }
    }

    async fn discard_session(&self, session: PlaybackSessionId) {
        if let Err(err) = self.ctx.adapter.stop(session).await {
            debug!(error = %err, "Engine stop failed while releasing session");
        }
        if let Err(err) = self.ctx.adapter.unload(session).await {
            warn!(error = %err, "Failed to unload engine session");
        }
    }

    /// Tear-down on service destruction.
    async fn release(&mut self) {
        self.generation += 1;
        self.release_session().await;
        if self.focus_held {
            self.abandon_focus().await;
        }
        self.remove_notification().await;
    }
}
