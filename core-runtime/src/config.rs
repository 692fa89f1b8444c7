//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every host capability and tunable the core needs. It
//! enforces fail-fast validation so a misconfigured host learns about it at
//! build time, not halfway through startup.
//!
//! ## Required Dependencies
//!
//! - `PlaybackAdapter` - Native media pipeline
//! - `CatalogClient` - Cloud catalog lookups
//!
//! ## Dependencies with desktop defaults
//!
//! - `SettingsStore` - Persisted preferences (desktop: SQLite)
//! - `HttpClient` - Manifest fetch and catalog traffic (desktop: reqwest,
//!   wired to the session cookie store)
//! - `ForegroundHost` - Foreground promotion and notifications
//! - `ProcessControl` - Build identity, tamper check, termination
//! - `AudioFocus` - Focus arbitration
//!
//! When the `desktop-shims` feature is enabled, these defaults are injected
//! automatically if not provided. Without it, each one must be supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .playback_adapter(Arc::new(MyEngine::new()))
//!     .catalog_client(Arc::new(MyCatalog::new()))
//!     .settings_path("/path/to/settings.db")
//!     .build()?;
//! ```

use crate::cookies::SessionCookieStore;
use crate::error::{Error, Result};
use bridge_traits::{
    AudioFocus, CatalogClient, ForegroundHost, HttpClient, PlaybackAdapter, ProcessControl,
    SettingsStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Manifest listing every authorized `(version_name, version_code)` pair.
pub const DEFAULT_MANIFEST_URL: &str = "https://moriafly.gitee.io/dso-page/dso/version_check.json";

/// Core configuration for the player core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// User preferences storage
    pub settings_store: Arc<dyn SettingsStore>,

    /// Process-wide session cookies
    pub cookie_store: Arc<SessionCookieStore>,

    /// HTTP client for the manifest check and catalog traffic
    pub http_client: Arc<dyn HttpClient>,

    /// Foreground-service promotion and notifications
    pub foreground_host: Arc<dyn ForegroundHost>,

    /// Build identity, tamper predicate, process exit
    pub process_control: Arc<dyn ProcessControl>,

    /// Audio focus arbitration
    pub audio_focus: Arc<dyn AudioFocus>,

    /// Native media pipeline
    pub playback_adapter: Arc<dyn PlaybackAdapter>,

    /// Cloud catalog lookups
    pub catalog_client: Arc<dyn CatalogClient>,

    /// Build authorization settings
    pub integrity: IntegrityConfig,

    /// Playback service tunables
    pub playback: PlaybackConfig,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field("cookie_store", &self.cookie_store)
            .field("http_client", &"HttpClient { ... }")
            .field("foreground_host", &"ForegroundHost { ... }")
            .field("process_control", &"ProcessControl { ... }")
            .field("audio_focus", &"AudioFocus { ... }")
            .field("playback_adapter", &"PlaybackAdapter { ... }")
            .field("catalog_client", &"CatalogClient { ... }")
            .field("integrity", &self.integrity)
            .field("playback", &self.playback)
            .field("features", &self.features)
            .finish()
    }
}

/// Remote build-authorization settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityConfig {
    /// HTTPS URL of the version manifest
    pub manifest_url: String,

    /// Upper bound for the single manifest request
    pub timeout: Duration,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Playback service tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Deadline between a foreground start and the notification becoming
    /// visible. The platform kills the process if it is missed.
    pub foreground_window: Duration,

    /// Consecutive Preparing failures (distinct tracks) before the queue stops
    pub max_consecutive_failures: u32,

    /// Capacity of the service command queue
    pub command_buffer: usize,

    /// Platform notification channel used for the playback notification
    pub notification_channel: String,

    /// Interval between position events while playing
    pub position_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            foreground_window: Duration::from_secs(5),
            max_consecutive_failures: 3,
            command_buffer: 64,
            notification_channel: "playback".to_string(),
            position_interval: Duration::from_secs(1),
        }
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the remote manifest check at startup
    pub enable_integrity_check: bool,

    /// Emit `PlaybackEvent::PositionChanged` while playing
    pub emit_position_events: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_integrity_check: true,
            emit_position_events: false,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The manifest URL is a non-empty HTTPS URL
    /// - Timeouts, windows and intervals are non-zero
    /// - The failure threshold and command buffer are non-zero
    pub fn validate(&self) -> Result<()> {
        let url = self.integrity.manifest_url.trim();
        if url.is_empty() {
            return Err(Error::Config("Manifest URL cannot be empty".to_string()));
        }

        if !url.starts_with("https://") || url.len() == "https://".len() {
            return Err(Error::Config(format!(
                "Manifest URL must use HTTPS: {}",
                url
            )));
        }

        if self.integrity.timeout.is_zero() {
            return Err(Error::Config(
                "Manifest timeout must be greater than zero".to_string(),
            ));
        }

        if self.playback.foreground_window.is_zero() {
            return Err(Error::Config(
                "Foreground window must be greater than zero".to_string(),
            ));
        }

        if self.playback.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "Consecutive failure threshold must be at least 1".to_string(),
            ));
        }

        if self.playback.command_buffer == 0 {
            return Err(Error::Config(
                "Command buffer must hold at least one command".to_string(),
            ));
        }

        if self.playback.notification_channel.trim().is_empty() {
            return Err(Error::Config(
                "Notification channel cannot be empty".to_string(),
            ));
        }

        if self.features.emit_position_events && self.playback.position_interval.is_zero() {
            return Err(Error::Config(
                "Position events enabled with a zero interval".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
mod defaults {
    use super::*;
    use bridge_desktop::{
        DesktopAudioFocus, DesktopForegroundHost, DesktopProcessControl, ReqwestHttpClient,
        SqliteSettingsStore,
    };
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    pub(super) fn settings_store(path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
        let path = path.or_else(SqliteSettingsStore::default_path).ok_or_else(|| {
            Error::capability_missing(
                "SettingsStore",
                "No user config directory available for the default SqliteSettingsStore. \
                 Use .settings_path() or inject a SettingsStore.",
            )
        })?;

        let init_store = |path: PathBuf| -> Result<_> {
            let runtime = Runtime::new().map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

            runtime
                .block_on(SqliteSettingsStore::new(path))
                .map_err(|e| {
                    Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
                })
        };

        // A runtime cannot be blocked on from inside another one.
        let store = match Handle::try_current() {
            Ok(_) => thread::spawn(move || init_store(path))
                .join()
                .map_err(|_| {
                    Error::Internal(
                        "Worker thread panicked while creating default SettingsStore".to_string(),
                    )
                })??,
            Err(_) => init_store(path)?,
        };

        Ok(Arc::new(store))
    }

    pub(super) fn http_client(cookies: Arc<SessionCookieStore>) -> Result<Arc<dyn HttpClient>> {
        Ok(Arc::new(ReqwestHttpClient::new().with_cookie_store(cookies)))
    }

    pub(super) fn foreground_host() -> Result<Arc<dyn ForegroundHost>> {
        Ok(Arc::new(DesktopForegroundHost::new()))
    }

    pub(super) fn process_control() -> Result<Arc<dyn ProcessControl>> {
        Ok(Arc::new(DesktopProcessControl::new()))
    }

    pub(super) fn audio_focus() -> Result<Arc<dyn AudioFocus>> {
        Ok(Arc::new(DesktopAudioFocus::new()))
    }
}

#[cfg(not(feature = "desktop-shims"))]
mod defaults {
    use super::*;

    pub(super) fn settings_store(_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
        Err(Error::capability_missing(
            "SettingsStore",
            "SettingsStore implementation is required for user preferences. \
             Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
             Mobile: inject platform-native settings (MMKV/DataStore/UserDefaults).",
        ))
    }

    pub(super) fn http_client(_cookies: Arc<SessionCookieStore>) -> Result<Arc<dyn HttpClient>> {
        Err(Error::capability_missing(
            "HttpClient",
            "HttpClient implementation is required for the manifest check and catalog. \
             Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
             Mobile: inject a client that consults the shared SessionCookieStore.",
        ))
    }

    pub(super) fn foreground_host() -> Result<Arc<dyn ForegroundHost>> {
        Err(Error::capability_missing(
            "ForegroundHost",
            "ForegroundHost implementation is required to promote the playback service. \
             Mobile: inject the platform foreground-service bridge.",
        ))
    }

    pub(super) fn process_control() -> Result<Arc<dyn ProcessControl>> {
        Err(Error::capability_missing(
            "ProcessControl",
            "ProcessControl implementation is required for build identity and termination.",
        ))
    }

    pub(super) fn audio_focus() -> Result<Arc<dyn AudioFocus>> {
        Err(Error::capability_missing(
            "AudioFocus",
            "AudioFocus implementation is required for audible playback.",
        ))
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    cookie_store: Option<Arc<SessionCookieStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    foreground_host: Option<Arc<dyn ForegroundHost>>,
    process_control: Option<Arc<dyn ProcessControl>>,
    audio_focus: Option<Arc<dyn AudioFocus>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
    catalog_client: Option<Arc<dyn CatalogClient>>,
    integrity: IntegrityConfig,
    playback: PlaybackConfig,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the settings store implementation.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Location of the default SQLite settings database (desktop only).
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Shares an existing cookie store instead of creating a fresh one.
    pub fn cookie_store(mut self, store: Arc<SessionCookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// A custom client is responsible for consulting the cookie store itself.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn foreground_host(mut self, host: Arc<dyn ForegroundHost>) -> Self {
        self.foreground_host = Some(host);
        self
    }

    pub fn process_control(mut self, control: Arc<dyn ProcessControl>) -> Self {
        self.process_control = Some(control);
        self
    }

    pub fn audio_focus(mut self, focus: Arc<dyn AudioFocus>) -> Self {
        self.audio_focus = Some(focus);
        self
    }

    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    pub fn catalog_client(mut self, client: Arc<dyn CatalogClient>) -> Self {
        self.catalog_client = Some(client);
        self
    }

    /// Overrides the manifest URL.
    pub fn manifest_url(mut self, url: impl Into<String>) -> Self {
        self.integrity.manifest_url = url.into();
        self
    }

    /// Overrides the manifest request timeout.
    pub fn manifest_timeout(mut self, timeout: Duration) -> Self {
        self.integrity.timeout = timeout;
        self
    }

    pub fn integrity(mut self, integrity: IntegrityConfig) -> Self {
        self.integrity = integrity;
        self
    }

    pub fn playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    /// Enables or disables the remote manifest check.
    pub fn enable_integrity_check(mut self, enabled: bool) -> Self {
        self.features.enable_integrity_check = enabled;
        self
    }

    /// Enables or disables periodic position events.
    pub fn emit_position_events(mut self, enabled: bool) -> Self {
        self.features.emit_position_events = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when the playback adapter or catalog client is
    ///   absent, or when a capability without a platform default is absent
    /// - `Config` when a value fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let playback_adapter = self.playback_adapter.ok_or_else(|| {
            Error::capability_missing(
                "PlaybackAdapter",
                "A PlaybackAdapter driving the native media pipeline is required. \
                 Use .playback_adapter() to set it.",
            )
        })?;

        let catalog_client = self.catalog_client.ok_or_else(|| {
            Error::capability_missing(
                "CatalogClient",
                "A CatalogClient resolving track identifiers is required. \
                 Use .catalog_client() to set it.",
            )
        })?;

        let cookie_store = self
            .cookie_store
            .unwrap_or_else(|| Arc::new(SessionCookieStore::new()));

        let http_client = match self.http_client {
            Some(client) => client,
            None => defaults::http_client(Arc::clone(&cookie_store))?,
        };

        let foreground_host = match self.foreground_host {
            Some(host) => host,
            None => defaults::foreground_host()?,
        };

        let process_control = match self.process_control {
            Some(control) => control,
            None => defaults::process_control()?,
        };

        let audio_focus = match self.audio_focus {
            Some(focus) => focus,
            None => defaults::audio_focus()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => defaults::settings_store(self.settings_path)?,
        };

        let config = CoreConfig {
            settings_store,
            cookie_store,
            http_client,
            foreground_host,
            process_control,
            audio_focus,
            playback_adapter,
            catalog_client,
            integrity: self.integrity,
            playback: self.playback,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::foreground::NotificationDescriptor;
    use bridge_traits::playback::{EngineEventStream, PlaybackRequest, PlaybackSessionId};
    use bridge_traits::process::{BuildInfo, TerminationReason};
    use bridge_traits::{HttpRequest, HttpResponse, PlayableTrack};

    struct NullSettings;

    #[async_trait]
    impl SettingsStore for NullSettings {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        async fn set_bool(&self, _key: &str, _value: bool) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_bool(&self, _key: &str) -> BridgeResult<Option<bool>> {
            Ok(None)
        }

        async fn set_i64(&self, _key: &str, _value: i64) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_i64(&self, _key: &str) -> BridgeResult<Option<i64>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn has_key(&self, _key: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct NullHttp;

    #[async_trait]
    impl HttpClient for NullHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(bridge_traits::BridgeError::NotAvailable("offline".to_string()))
        }
    }

    struct NullForeground;

    #[async_trait]
    impl ForegroundHost for NullForeground {
        fn api_level(&self) -> u32 {
            0
        }

        fn start_foreground(&self, _notification: NotificationDescriptor) -> BridgeResult<()> {
            Ok(())
        }

        async fn update_notification(
            &self,
            _notification: NotificationDescriptor,
        ) -> BridgeResult<()> {
            Ok(())
        }

        async fn stop_foreground(&self, _remove_notification: bool) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NullProcess;

    impl ProcessControl for NullProcess {
        fn build_info(&self) -> BuildInfo {
            BuildInfo::new("1.0.0", 1)
        }

        fn is_trusted_build(&self) -> bool {
            true
        }

        fn terminate(&self, _reason: TerminationReason) {}
    }

    struct NullFocus;

    #[async_trait]
    impl AudioFocus for NullFocus {
        async fn request_focus(&self) -> BridgeResult<bool> {
            Ok(true)
        }

        async fn abandon_focus(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NullEngine;

    #[async_trait]
    impl PlaybackAdapter for NullEngine {
        async fn prepare(&self, _request: PlaybackRequest) -> BridgeResult<PlaybackSessionId> {
            Ok(PlaybackSessionId::new())
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
            Ok(Duration::ZERO)
        }

        async fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
            Ok(())
        }

        async fn subscribe_events(&self) -> BridgeResult<Box<dyn EngineEventStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("no events".to_string()))
        }
    }

    struct NullCatalog;

    #[async_trait]
    impl CatalogClient for NullCatalog {
        async fn resolve(&self, track_id: &str) -> BridgeResult<PlayableTrack> {
            Ok(PlayableTrack::new(track_id, track_id, "https://cdn.example.com/a.mp3"))
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .settings_store(Arc::new(NullSettings))
            .http_client(Arc::new(NullHttp))
            .foreground_host(Arc::new(NullForeground))
            .process_control(Arc::new(NullProcess))
            .audio_focus(Arc::new(NullFocus))
            .playback_adapter(Arc::new(NullEngine))
            .catalog_client(Arc::new(NullCatalog))
    }

    #[test]
    fn test_builder_with_all_capabilities() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.integrity.manifest_url, DEFAULT_MANIFEST_URL);
        assert_eq!(config.integrity.timeout, Duration::from_secs(10));
        assert_eq!(config.playback.foreground_window, Duration::from_secs(5));
        assert_eq!(config.playback.max_consecutive_failures, 3);
        assert!(config.features.enable_integrity_check);
        assert!(!config.features.emit_position_events);
        assert!(config.cookie_store.is_empty());
    }

    #[test]
    fn test_builder_requires_playback_adapter() {
        let err = CoreConfig::builder()
            .catalog_client(Arc::new(NullCatalog))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "PlaybackAdapter"));
    }

    #[test]
    fn test_builder_requires_catalog_client() {
        let err = CoreConfig::builder()
            .playback_adapter(Arc::new(NullEngine))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("CatalogClient"));
    }

    #[test]
    fn test_builder_shares_cookie_store() {
        let cookies = Arc::new(SessionCookieStore::new());
        let config = complete_builder()
            .cookie_store(Arc::clone(&cookies))
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&config.cookie_store, &cookies));
    }

    #[test]
    fn test_validate_rejects_plain_http_manifest() {
        let err = complete_builder()
            .manifest_url("http://example.com/version_check.json")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("HTTPS"));

        let err = complete_builder().manifest_url("  ").build().unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));

        let err = complete_builder().manifest_url("https://").build().unwrap_err();
        assert!(err.to_string().contains("HTTPS"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let err = complete_builder()
            .manifest_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Manifest timeout"));
    }

    #[test]
    fn test_validate_rejects_zero_thresholds() {
        let err = complete_builder()
            .playback(PlaybackConfig {
                max_consecutive_failures: 0,
                ..PlaybackConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("failure threshold"));

        let err = complete_builder()
            .playback(PlaybackConfig {
                command_buffer: 0,
                ..PlaybackConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Command buffer"));

        let err = complete_builder()
            .playback(PlaybackConfig {
                foreground_window: Duration::ZERO,
                ..PlaybackConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Foreground window"));
    }

    #[test]
    fn test_position_interval_checked_only_when_enabled() {
        let zero_interval = PlaybackConfig {
            position_interval: Duration::ZERO,
            ..PlaybackConfig::default()
        };

        assert!(complete_builder()
            .playback(zero_interval.clone())
            .build()
            .is_ok());
        assert!(complete_builder()
            .playback(zero_interval)
            .emit_position_events(true)
            .build()
            .is_err());
    }

    #[test]
    fn test_feature_flags_default() {
        let flags = FeatureFlags::default();
        assert!(flags.enable_integrity_check);
        assert!(!flags.emit_position_events);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_settings_store_without_desktop_shims() {
        let err = CoreConfig::builder()
            .http_client(Arc::new(NullHttp))
            .foreground_host(Arc::new(NullForeground))
            .process_control(Arc::new(NullProcess))
            .audio_focus(Arc::new(NullFocus))
            .playback_adapter(Arc::new(NullEngine))
            .catalog_client(Arc::new(NullCatalog))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("SettingsStore"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let base = std::env::temp_dir().join(format!(
            "core-runtime-test-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let config = CoreConfig::builder()
            .playback_adapter(Arc::new(NullEngine))
            .catalog_client(Arc::new(NullCatalog))
            .settings_path(base.join("settings.db"))
            .build()
            .expect("desktop defaults should succeed");

        let settings = config.settings_store.clone();
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            settings.set_bool("dark_theme", true).await.unwrap();
            assert_eq!(settings.get_bool("dark_theme").await.unwrap(), Some(true));
        });
        assert_eq!(config.foreground_host.api_level(), 0);

        drop(config);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_build_with_desktop_defaults_inside_runtime() {
        let base = std::env::temp_dir().join(format!(
            "core-runtime-rt-test-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let config = CoreConfig::builder()
            .playback_adapter(Arc::new(NullEngine))
            .catalog_client(Arc::new(NullCatalog))
            .settings_path(base.join("settings.db"))
            .build()
            .expect("desktop defaults should succeed inside runtime");

        assert!(config.process_control.is_trusted_build());

        drop(config);
        let _ = tokio::fs::remove_dir_all(&base).await;
    }
}
