//! Core service façade and process bootstrap.
//!
//! This crate wires host-provided bridge implementations (HTTP, settings,
//! playback engine, foreground host, process control) into the playback core
//! and owns every process-wide object that would otherwise be a global: the
//! event bus, the state channel, the cookie store, the service host and the
//! connection proxy. Desktop apps typically enable the `desktop-shims` feature
//! (which depends on `bridge-desktop`) so `CoreConfig::builder()` can fill in
//! the capabilities the host does not provide.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .playback_adapter(engine)
//!     .catalog_client(catalog)
//!     .build()?;
//! let core = ProcessBootstrap::new(config).launch().await?;
//! let mut observer = core.observe();
//! ```

pub mod bootstrap;
pub mod error;
pub mod integrity;

pub use bootstrap::{ProcessBootstrap, DARK_THEME_KEY};
pub use error::{CoreError, Result};
pub use integrity::{parse_manifest, IntegrityGate, ManifestCheck, ManifestEntry};

use std::sync::Arc;

use bridge_traits::process::BuildInfo;
use core_playback::{
    ControllerHandle, PlaybackServiceHost, ServiceConnectionProxy, StateChannel, StateObserver,
};
use core_runtime::events::EventBus;
use core_runtime::SessionCookieStore;
use tokio::task::JoinHandle;
use tracing::info;

/// Primary façade exposed to host applications.
pub struct CoreService {
    pub(crate) events: EventBus,
    pub(crate) channel: StateChannel,
    pub(crate) cookie_store: Arc<SessionCookieStore>,
    pub(crate) host: Arc<PlaybackServiceHost>,
    pub(crate) proxy: ServiceConnectionProxy,
    pub(crate) integrity: Option<JoinHandle<ManifestCheck>>,
    pub(crate) dark_theme: bool,
    pub(crate) build: BuildInfo,
}

impl CoreService {
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn state_channel(&self) -> &StateChannel {
        &self.channel
    }

    /// Observe the live controller; the current value arrives first.
    pub fn observe(&self) -> StateObserver {
        self.channel.observe()
    }

    /// Controller currently published, if the service is connected.
    pub fn controller(&self) -> Option<ControllerHandle> {
        self.channel.current()
    }

    pub fn cookie_store(&self) -> Arc<SessionCookieStore> {
        Arc::clone(&self.cookie_store)
    }

    pub fn proxy(&self) -> &ServiceConnectionProxy {
        &self.proxy
    }

    pub fn host(&self) -> Arc<PlaybackServiceHost> {
        Arc::clone(&self.host)
    }

    /// Dark-theme preference read once at launch.
    pub fn dark_theme(&self) -> bool {
        self.dark_theme
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build
    }

    /// Take the background manifest check, if it was started and not taken
    /// yet. Awaiting it is optional.
    pub fn take_integrity_task(&mut self) -> Option<JoinHandle<ManifestCheck>> {
        self.integrity.take()
    }

    /// Release the connection and stop the playback service.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down core service");
        self.proxy.unbind().await?;
        self.host.stop_service().await;
        Ok(())
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("build", &self.build)
            .field("dark_theme", &self.dark_theme)
            .field("connection", &self.proxy.state())
            .finish_non_exhaustive()
    }
}
