//! # Integrity Gate
//!
//! Startup-time authorization of the running build.
//!
//! Two checks run at different points:
//!
//! 1. [`IntegrityGate::verify_installation`] is the synchronous tamper
//!    predicate. It runs before anything else and terminates the process when
//!    the installation is not trusted.
//! 2. [`IntegrityGate::run`] fetches the remote version manifest once and
//!    terminates the process when the running `(version_name, version_code)`
//!    pair is not listed.
//!
//! Only a manifest that was fetched and parsed can revoke a build. A timeout,
//! a transport failure, a non-2xx status or an unparseable body all let the
//! session continue.

use std::fmt;
use std::sync::Arc;

use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use bridge_traits::process::{BuildInfo, ProcessControl, TerminationReason};
use core_runtime::config::{CoreConfig, IntegrityConfig};
use core_runtime::events::{CoreEvent, EventBus, IntegrityEvent};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one manifest check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestCheck {
    /// The manifest lists the running build.
    Authorized,
    /// The manifest was read and does not list the running build.
    Revoked,
    /// No response within the configured timeout.
    TimedOut,
    /// Transport error or non-2xx status.
    Unreachable(String),
    /// The body is not a version manifest.
    Malformed(String),
}

impl ManifestCheck {
    /// Whether this outcome ends the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ManifestCheck::Revoked)
    }
}

impl fmt::Display for ManifestCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestCheck::Authorized => f.write_str("authorized"),
            ManifestCheck::Revoked => f.write_str("revoked"),
            ManifestCheck::TimedOut => f.write_str("timed out"),
            ManifestCheck::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            ManifestCheck::Malformed(reason) => write!(f, "malformed: {}", reason),
        }
    }
}

/// One authorized build as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    #[serde(alias = "versionName", alias = "version_name")]
    pub name: String,
    #[serde(alias = "versionCode", alias = "version_code")]
    pub code: i64,
}

impl ManifestEntry {
    fn matches(&self, build: &BuildInfo) -> bool {
        self.name == build.version_name && self.code == build.version_code
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Wrapped { data: Vec<ManifestEntry> },
    Bare(Vec<ManifestEntry>),
}

/// Parse a version manifest body.
///
/// Accepts `{"data": [{"name": .., "code": ..}]}` or the bare array.
pub fn parse_manifest(body: &[u8]) -> Result<Vec<ManifestEntry>, serde_json::Error> {
    let document: ManifestDocument = serde_json::from_slice(body)?;
    Ok(match document {
        ManifestDocument::Wrapped { data } => data,
        ManifestDocument::Bare(entries) => entries,
    })
}

/// Build authorization gate.
pub struct IntegrityGate {
    http: Arc<dyn HttpClient>,
    process: Arc<dyn ProcessControl>,
    events: EventBus,
    config: IntegrityConfig,
}

impl IntegrityGate {
    pub fn new(
        http: Arc<dyn HttpClient>,
        process: Arc<dyn ProcessControl>,
        events: EventBus,
        config: IntegrityConfig,
    ) -> Self {
        Self {
            http,
            process,
            events,
            config,
        }
    }

    pub fn from_config(config: &CoreConfig, events: EventBus) -> Self {
        Self::new(
            Arc::clone(&config.http_client),
            Arc::clone(&config.process_control),
            events,
            config.integrity.clone(),
        )
    }

    pub fn build_info(&self) -> BuildInfo {
        self.process.build_info()
    }

    /// Synchronous tamper check. Terminates the process and returns `false`
    /// when the installation is not trusted.
    #[instrument(skip(self))]
    pub fn verify_installation(&self) -> bool {
        if self.process.is_trusted_build() {
            debug!("Installation passed tamper check");
            return true;
        }

        error!("Installation failed tamper check, terminating");
        self.emit(IntegrityEvent::Untrusted);
        self.process.terminate(TerminationReason::UntrustedBuild);
        false
    }

    /// Fetch the manifest once and compare it to the running build.
    #[instrument(skip(self), fields(url = %self.config.manifest_url))]
    pub async fn check(&self) -> ManifestCheck {
        let build = self.build_info();
        let request =
            HttpRequest::get(self.config.manifest_url.clone()).timeout(self.config.timeout);

        let response = match tokio::time::timeout(
            self.config.timeout,
            self.http.execute_with_retry(request, RetryPolicy::no_retry()),
        )
        .await
        {
            Err(_) => return ManifestCheck::TimedOut,
            Ok(Err(BridgeError::Timeout(_))) => return ManifestCheck::TimedOut,
            Ok(Err(err)) => return ManifestCheck::Unreachable(err.to_string()),
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            return ManifestCheck::Unreachable(format!("HTTP {}", response.status));
        }

        match parse_manifest(&response.body) {
            Ok(entries) if entries.iter().any(|entry| entry.matches(&build)) => {
                ManifestCheck::Authorized
            }
            Ok(entries) => {
                debug!(listed = entries.len(), %build, "Running build not in manifest");
                ManifestCheck::Revoked
            }
            Err(err) => ManifestCheck::Malformed(err.to_string()),
        }
    }

    /// Run [`check`](Self::check) and apply its verdict.
    ///
    /// `Revoked` terminates the process; every other outcome lets it continue.
    pub async fn run(&self) -> ManifestCheck {
        let outcome = self.check().await;

        match &outcome {
            ManifestCheck::Authorized => {
                info!("Build authorized by manifest");
                self.emit(IntegrityEvent::Passed);
            }
            ManifestCheck::Revoked => {
                let build = self.build_info();
                error!(%build, "Build revoked by manifest, terminating");
                self.emit(IntegrityEvent::Revoked {
                    version_name: build.version_name.clone(),
                    version_code: build.version_code,
                });
                self.process.terminate(TerminationReason::RevokedBuild(build));
            }
            inconclusive => {
                warn!(outcome = %inconclusive, "Manifest check inconclusive, continuing");
                self.emit(IntegrityEvent::Inconclusive {
                    reason: inconclusive.to_string(),
                });
            }
        }

        outcome
    }

    /// Run the gate in the background. The caller does not wait for it.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<ManifestCheck> {
        tokio::spawn(async move { self.run().await })
    }

    fn emit(&self, event: IntegrityEvent) {
        let _ = self.events.emit(CoreEvent::Integrity(event));
    }
}

impl fmt::Debug for IntegrityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrityGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
