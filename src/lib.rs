//! Workspace façade crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-playback`, `core-runtime`). Host
//! applications can depend on `player-workspace` and enable the documented
//! features without wiring each crate individually.
//!
//! - `desktop-shims` (default): desktop bridge implementations are injected
//!   automatically for every capability the host does not provide.
//! - `headless`: no default bridges; the host must inject every capability.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_playback as playback;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_runtime as runtime;
#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::{CoreError, CoreService, IntegrityGate, ManifestCheck, ProcessBootstrap};
