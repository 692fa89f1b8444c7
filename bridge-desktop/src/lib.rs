//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, attaching and capturing session cookies
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `ForegroundHost` recording the notification (desktop has no
//!   foreground-service deadline)
//! - `AudioFocus` that always grants focus
//! - `ProcessControl` hashing the running executable for the tamper check
//!
//! The playback engine and the catalog client are not provided here; hosts
//! always inject those.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cookies = Arc::new(core_runtime::SessionCookieStore::new());
//!     let http_client = ReqwestHttpClient::new().with_cookie_store(cookies);
//!     let settings = SqliteSettingsStore::in_memory().await.unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod audio;
mod foreground;
mod http;
mod process;
mod settings;

pub use audio::DesktopAudioFocus;
pub use foreground::DesktopForegroundHost;
pub use http::ReqwestHttpClient;
pub use process::{file_digest, version_code_from, DesktopProcessControl};
pub use settings::SqliteSettingsStore;
