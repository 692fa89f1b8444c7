//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform-specific pieces it cannot own itself. Each trait represents a
//! capability the core requires but that is implemented differently per
//! platform (desktop, Android, iOS).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and timeouts
//! - [`CookieStore`](cookies::CookieStore) - Session cookies shared by every network call
//! - [`CatalogClient`](catalog::CatalogClient) - Cloud music catalog lookups
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Playback & Platform Integration
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - Native media pipeline
//! - [`AudioFocus`](playback::AudioFocus) - Platform audio-focus arbitration
//! - [`ForegroundHost`](foreground::ForegroundHost) - Foreground-service promotion and notifications
//! - [`ProcessControl`](process::ProcessControl) - Build identity, tamper check, process exit
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Android  | host-injected       | 📋 Planned |
//! | iOS      | host-injected       | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError`,
//! keep messages actionable, and report deadline expiry as
//! [`BridgeError::Timeout`] so callers can branch on it.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind `Arc<dyn Trait>`.

pub mod catalog;
pub mod cookies;
pub mod error;
pub mod foreground;
pub mod http;
pub mod playback;
pub mod process;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{CatalogClient, PlayableTrack};
pub use cookies::{Cookie, CookieStore};
pub use foreground::{ForegroundHost, NotificationDescriptor, StartMode};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{
    AudioFocus, EngineEvent, EngineEventStream, PlaybackAdapter, PlaybackRequest,
    PlaybackSessionId, PlaybackStatus,
};
pub use process::{BuildInfo, ProcessControl, TerminationReason};
pub use storage::SettingsStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
