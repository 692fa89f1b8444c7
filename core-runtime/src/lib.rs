//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the player core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//! - The process-wide session cookie store
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback and service crates
//! depend on. It establishes the logging conventions, the capability wiring,
//! and the event broadcasting used throughout the system.

pub mod config;
pub mod cookies;
pub mod error;
pub mod events;
pub mod logging;

pub use cookies::SessionCookieStore;
pub use error::{Error, Result};
