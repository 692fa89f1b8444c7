//! Process startup sequence.
//!
//! ```text
//! stores ready ─▶ tamper check ──fail──▶ terminate
//!                      │
//!                      ├──▶ spawn IntegrityGate (not awaited)
//!                      ├──▶ start PlaybackService (foreground by API level)
//!                      ├──▶ bind ServiceConnectionProxy
//!                      └──▶ read dark-theme flag
//! ```

use std::sync::Arc;

use bridge_traits::process::TerminationReason;
use bridge_traits::storage::keys;
use core_playback::{PlaybackServiceHost, ServiceConnectionProxy, ServiceContext, StateChannel};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use tracing::{info, instrument, warn};

use crate::error::{CoreError, Result};
use crate::integrity::IntegrityGate;
use crate::CoreService;

/// Settings key of the persisted dark-theme preference.
pub const DARK_THEME_KEY: &str = keys::DARK_THEME;

const EVENT_BUFFER: usize = 256;

/// Turns a validated [`CoreConfig`] into a running [`CoreService`].
#[derive(Debug)]
pub struct ProcessBootstrap {
    config: CoreConfig,
}

impl ProcessBootstrap {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    /// Run the startup sequence.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Config`] when the configuration does not validate
    /// - [`CoreError::Terminated`] when the tamper check rejected the
    ///   installation; nothing was started
    /// - [`CoreError::Playback`] when the playback service could not start
    #[instrument(skip(self))]
    pub async fn launch(self) -> Result<CoreService> {
        let config = self.config;
        config.validate()?;

        let events = EventBus::new(EVENT_BUFFER);
        let channel = StateChannel::new();
        let host = Arc::new(PlaybackServiceHost::new(ServiceContext::from_config(
            &config,
            events.clone(),
        )));
        let gate = Arc::new(IntegrityGate::from_config(&config, events.clone()));

        if !gate.verify_installation() {
            return Err(CoreError::Terminated(
                TerminationReason::UntrustedBuild.to_string(),
            ));
        }

        let integrity = if config.features.enable_integrity_check {
            Some(Arc::clone(&gate).spawn())
        } else {
            info!("Manifest check disabled");
            None
        };

        let mode = host.start_mode();
        host.start_service(mode).await?;

        let proxy = ServiceConnectionProxy::new(host.clone(), channel.clone(), events.clone());
        proxy.bind().await?;

        let dark_theme = match config
            .settings_store
            .get_bool_or(DARK_THEME_KEY, false)
            .await
        {
            Ok(enabled) => enabled,
            Err(err) => {
                warn!(error = %err, "Failed to read dark theme flag, using light theme");
                false
            }
        };

        info!(?mode, build = %gate.build_info(), dark_theme, "Core service launched");

        Ok(CoreService {
            events,
            channel,
            cookie_store: Arc::clone(&config.cookie_store),
            host,
            proxy,
            integrity,
            dark_theme,
            build: gate.build_info(),
        })
    }
}
