//! # Service Connection Proxy
//!
//! Client-side handle UI components use to attach to the playback service.
//!
//! On connect the proxy publishes the service's [`ControllerHandle`] into the
//! [`StateChannel`]; on disconnect it clears the slot before the disconnect
//! callback returns. Observers only ever talk to the channel, so neither side
//! knows who is on the other end.
//!
//! Every `bind()` opens a new epoch. Callbacks carry the epoch they were
//! issued for, so a late connect from a binding that was already released is
//! ignored instead of republishing a controller nobody asked for.

use std::fmt;
use std::sync::{Arc, Weak};

use core_runtime::events::{ConnectionEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::StateChannel;
use crate::controller::ControllerHandle;
use crate::error::Result;
use crate::host::{BindingId, ServiceBinder, ServiceConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ProxyState {
    connection: ConnectionState,
    binding: Option<BindingId>,
    epoch: u64,
}

struct ProxyInner {
    binder: Arc<dyn ServiceBinder>,
    channel: StateChannel,
    events: EventBus,
    state: Mutex<ProxyState>,
}

impl ProxyInner {
    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.emit(CoreEvent::Connection(event));
    }

    fn on_connected(&self, epoch: u64, controller: ControllerHandle) {
        let mut state = self.state.lock();
        if state.epoch != epoch || state.connection != ConnectionState::Connecting {
            debug!(epoch, current = state.epoch, "Ignoring connect for a released binding");
            return;
        }
        if !controller.is_alive() {
            warn!("Service connected with an invalidated controller");
            return;
        }

        let instance_id = controller.instance_id();
        self.channel.publish(Some(controller));
        state.connection = ConnectionState::Connected;
        drop(state);

        info!(%instance_id, "Playback service connected");
        self.emit(ConnectionEvent::Connected {
            instance_id: instance_id.to_string(),
        });
    }

    fn on_disconnected(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch != epoch || state.connection == ConnectionState::Disconnected {
            return;
        }

        self.channel.publish(None);
        state.connection = ConnectionState::Disconnected;
        state.binding = None;
        drop(state);

        warn!("Playback service disconnected unexpectedly");
        self.emit(ConnectionEvent::Disconnected { unexpected: true });
    }
}

/// Connection callbacks for one bind epoch.
struct EpochConnection {
    proxy: Weak<ProxyInner>,
    epoch: u64,
}

impl ServiceConnection for EpochConnection {
    fn on_service_connected(&self, controller: ControllerHandle) {
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.on_connected(self.epoch, controller);
        }
    }

    fn on_service_disconnected(&self) {
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.on_disconnected(self.epoch);
        }
    }
}

/// The only writer of its [`StateChannel`].
#[derive(Clone)]
pub struct ServiceConnectionProxy {
    inner: Arc<ProxyInner>,
}

impl ServiceConnectionProxy {
    pub fn new(binder: Arc<dyn ServiceBinder>, channel: StateChannel, events: EventBus) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                binder,
                channel,
                events,
                state: Mutex::new(ProxyState {
                    connection: ConnectionState::Disconnected,
                    binding: None,
                    epoch: 0,
                }),
            }),
        }
    }

    /// Request a connection. No-op while connecting or connected.
    ///
    /// Returns once the binder accepted the request; the controller shows up
    /// in the channel when the connect callback fires.
    pub async fn bind(&self) -> Result<()> {
        let epoch = {
            let mut state = self.inner.state.lock();
            if state.connection != ConnectionState::Disconnected {
                debug!(state = ?state.connection, "Bind ignored");
                return Ok(());
            }
            state.connection = ConnectionState::Connecting;
            state.epoch += 1;
            state.epoch
        };
        self.inner.emit(ConnectionEvent::Connecting);

        let connection = Arc::new(EpochConnection {
            proxy: Arc::downgrade(&self.inner),
            epoch,
        });

        match self.inner.binder.bind_service(connection).await {
            Ok(binding) => {
                let stale = {
                    let mut state = self.inner.state.lock();
                    if state.epoch == epoch && state.connection != ConnectionState::Disconnected {
                        state.binding = Some(binding);
                        false
                    } else {
                        true
                    }
                };
                if stale {
                    debug!(%binding, "Unbound while binding; releasing");
                    self.inner.binder.unbind_service(binding).await?;
                }
                Ok(())
            }
            Err(err) => {
                let mut state = self.inner.state.lock();
                if state.epoch == epoch {
                    state.connection = ConnectionState::Disconnected;
                }
                drop(state);
                warn!(error = %err, "Binding playback service failed");
                Err(err)
            }
        }
    }

    /// Clear the channel and release the binding. A started service that is
    /// playing keeps running.
    pub async fn unbind(&self) -> Result<()> {
        let (binding, was_bound) = {
            let mut state = self.inner.state.lock();
            let was_bound = state.connection != ConnectionState::Disconnected;
            state.connection = ConnectionState::Disconnected;
            state.epoch += 1;
            self.inner.channel.publish(None);
            (state.binding.take(), was_bound)
        };

        if was_bound {
            info!("Playback service unbound");
            self.inner
                .emit(ConnectionEvent::Disconnected { unexpected: false });
        }

        match binding {
            Some(binding) => self.inner.binder.unbind_service(binding).await,
            None => Ok(()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Controller currently published, if connected.
    pub fn controller(&self) -> Option<ControllerHandle> {
        self.inner.channel.current()
    }

    pub fn channel(&self) -> &StateChannel {
        &self.inner.channel
    }
}

impl fmt::Debug for ServiceConnectionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnectionProxy")
            .field("state", &self.state())
            .finish()
    }
}
