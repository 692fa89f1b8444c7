//! # Playback Service Host
//!
//! Process-side owner of the playback service lifecycle, playing the role the
//! platform service manager plays on mobile.
//!
//! - `start_service` creates the service (if needed) in the requested mode and
//!   marks it started.
//! - `bind_service` auto-creates the service and delivers the controller to
//!   the client's [`ServiceConnection`] asynchronously.
//! - The service is destroyed when its last client unbinds, unless it was
//!   started and is active (Preparing or Playing). It is also destroyed when
//!   stopped with no clients bound, or when killed. Destruction clears the
//!   started flag.
//!
//! Destruction always runs in the same order: every bound connection gets
//! `on_service_disconnected` synchronously, then outstanding controllers are
//! invalidated, then the engine is torn down. No observer can therefore read
//! a controller of a destroyed instance from the state channel.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::foreground::StartMode;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::controller::ControllerHandle;
use crate::error::Result;
use crate::service::{PlaybackService, ServiceContext};

/// Identifies one binding handed out by a [`ServiceBinder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(pub(crate) u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// Client-side callbacks of a service binding.
pub trait ServiceConnection: Send + Sync {
    /// The service is up; `controller` is valid until the matching
    /// disconnect.
    fn on_service_connected(&self, controller: ControllerHandle);

    /// The service went away. Called synchronously before the service is torn
    /// down; implementations must drop every use of the controller before
    /// returning.
    fn on_service_disconnected(&self);
}

/// Connection seam between clients and the component hosting the service.
#[async_trait]
pub trait ServiceBinder: Send + Sync {
    /// Register `connection`, creating the service if it does not exist yet.
    /// The connect callback arrives asynchronously.
    async fn bind_service(&self, connection: Arc<dyn ServiceConnection>) -> Result<BindingId>;

    /// Release a binding. Unknown ids are ignored.
    async fn unbind_service(&self, binding: BindingId) -> Result<()>;
}

#[derive(Default)]
struct HostState {
    service: Option<PlaybackService>,
    started: bool,
    bindings: BTreeMap<BindingId, Arc<dyn ServiceConnection>>,
    next_binding: u64,
}

/// Owns at most one [`PlaybackService`] at a time.
#[derive(Clone)]
pub struct PlaybackServiceHost {
    ctx: ServiceContext,
    state: Arc<Mutex<HostState>>,
}

impl PlaybackServiceHost {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            state: Arc::new(Mutex::new(HostState::default())),
        }
    }

    /// Start mode mandated by the host API level.
    pub fn start_mode(&self) -> StartMode {
        self.ctx.start_mode()
    }

    /// Create the service if needed and mark it started.
    #[instrument(skip(self))]
    pub async fn start_service(&self, mode: StartMode) -> Result<ControllerHandle> {
        let mut state = self.state.lock().await;
        let controller = self.ensure_service(&mut state, mode).await?;
        state.started = true;
        Ok(controller)
    }

    /// Clear the started flag; destroys the service if no client is bound.
    #[instrument(skip(self))]
    pub async fn stop_service(&self) {
        let mut state = self.state.lock().await;
        state.started = false;

        if state.bindings.is_empty() {
            self.destroy(&mut state).await;
        } else {
            debug!(
                clients = state.bindings.len(),
                "Stop requested with bound clients; service stays until they unbind"
            );
        }
    }

    /// Destroy the service regardless of clients, as a crash or low-memory
    /// kill would.
    pub async fn kill(&self) {
        let mut state = self.state.lock().await;
        warn!("Killing playback service");
        self.destroy(&mut state).await;
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.service.is_some()
    }

    pub async fn is_started(&self) -> bool {
        self.state.lock().await.started
    }

    pub async fn binding_count(&self) -> usize {
        self.state.lock().await.bindings.len()
    }

    /// Controller of the running instance, if any.
    pub async fn controller(&self) -> Option<ControllerHandle> {
        self.state
            .lock()
            .await
            .service
            .as_ref()
            .map(PlaybackService::controller)
    }

    async fn ensure_service(
        &self,
        state: &mut HostState,
        mode: StartMode,
    ) -> Result<ControllerHandle> {
        if let Some(service) = &state.service {
            return Ok(service.controller());
        }

        let service = PlaybackService::start(self.ctx.clone(), mode).await?;
        let controller = service.controller();
        state.service = Some(service);
        Ok(controller)
    }

    async fn destroy(&self, state: &mut HostState) {
        state.started = false;
        let Some(service) = state.service.take() else {
            return;
        };
        info!(
            instance_id = %service.instance_id(),
            clients = state.bindings.len(),
            "Destroying playback service"
        );

        for connection in state.bindings.values() {
            connection.on_service_disconnected();
        }
        state.bindings.clear();

        service.invalidate();
        service.shutdown().await;
    }
}

#[async_trait]
impl ServiceBinder for PlaybackServiceHost {
    async fn bind_service(&self, connection: Arc<dyn ServiceConnection>) -> Result<BindingId> {
        let mut state = self.state.lock().await;
        self.ensure_service(&mut state, StartMode::Background)
            .await?;

        state.next_binding += 1;
        let id = BindingId(state.next_binding);
        state.bindings.insert(id, Arc::clone(&connection));
        debug!(%id, "Client bound");
        drop(state);

        // Delivered under the host lock so a concurrent destroy cannot slip
        // between the liveness check and the callback.
        let shared = Arc::clone(&self.state);
        tokio::spawn(async move {
            let state = shared.lock().await;
            let controller = match (&state.service, state.bindings.contains_key(&id)) {
                (Some(service), true) => service.controller(),
                _ => {
                    debug!(%id, "Binding gone before connect delivery");
                    return;
                }
            };
            connection.on_service_connected(controller);
        });

        Ok(id)
    }

    async fn unbind_service(&self, binding: BindingId) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.bindings.remove(&binding).is_none() {
            return Ok(());
        }
        debug!(id = %binding, remaining = state.bindings.len(), "Client unbound");

        if !state.bindings.is_empty() {
            return Ok(());
        }

        // Only a started service outlives its clients, and only while it is
        // producing audio.
        let active = state
            .service
            .as_ref()
            .map_or(false, PlaybackService::is_active);
        if state.started && active {
            debug!("Last client left while playing; started service keeps running");
        } else {
            self.destroy(&mut state).await;
        }
        Ok(())
    }
}

impl fmt::Debug for PlaybackServiceHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackServiceHost").finish_non_exhaustive()
    }
}
