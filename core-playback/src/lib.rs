//! # Playback Session Module
//!
//! Keeps a long-lived background audio session alive and observable while
//! transient UI components come and go.
//!
//! ## Overview
//!
//! This module handles:
//! - The playback service actor that owns the engine session, the queue and
//!   the foreground notification
//! - Liveness-checked controller handles
//! - The service host and the client-side connection proxy
//! - The state channel that carries the live controller to any number of
//!   observers
//!
//! Audio decoding and mixing stay in the platform media pipeline behind
//! [`bridge_traits::PlaybackAdapter`].

pub mod channel;
pub mod connection;
pub mod controller;
pub mod error;
pub mod host;
pub mod service;
pub mod types;

pub use channel::{StateChannel, StateObserver};
pub use connection::{ConnectionState, ServiceConnectionProxy};
pub use controller::ControllerHandle;
pub use error::{PlaybackError, Result};
pub use host::{BindingId, PlaybackServiceHost, ServiceBinder, ServiceConnection};
pub use service::{PlaybackService, ServiceContext};
pub use types::{
    PlayRequest, PlaybackFailure, PlaybackSnapshot, RepeatMode, ServiceInstanceId, SkipDirection,
};
