//! Foreground Service Contract
//!
//! Mobile platforms only let a long-lived audio service keep running while it
//! shows a persistent, user-visible notification. On Android (API 26+) a
//! service started with `startForegroundService` must call `startForeground`
//! within a few seconds or the OS kills it; that deadline is not recoverable.
//! Older platforms and desktops use a plain background start instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// First platform API level on which a foreground start is mandatory.
pub const FOREGROUND_START_MIN_API_LEVEL: u32 = 26;

/// Window the platform allows between a foreground start and promotion.
pub const PLATFORM_PROMOTION_DEADLINE: Duration = Duration::from_secs(5);

/// How the playback service is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartMode {
    /// Foreground start; the service must promote itself with a notification
    /// before [`PLATFORM_PROMOTION_DEADLINE`] elapses.
    Foreground,
    /// Plain background start (older platforms, desktop).
    Background,
}

impl StartMode {
    /// Pick the start mode mandated by the host API level.
    pub fn for_api_level(api_level: u32) -> Self {
        if api_level >= FOREGROUND_START_MIN_API_LEVEL {
            StartMode::Foreground
        } else {
            StartMode::Background
        }
    }
}

/// Content of the persistent playback notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    /// Platform notification channel identifier.
    pub channel_id: String,
    pub title: String,
    pub text: String,
    /// Whether the notification shows a "pause" (true) or "play" (false) action.
    pub playing: bool,
    /// Whether the user may swipe the notification away.
    pub ongoing: bool,
}

impl NotificationDescriptor {
    pub fn new(channel_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            title: title.into(),
            text: String::new(),
            playing: false,
            ongoing: true,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_playing(mut self, playing: bool) -> Self {
        self.playing = playing;
        self
    }
}

/// Host-side foreground-service operations.
///
/// `start_foreground` is called synchronously from the service start path so
/// promotion happens as early as possible; implementations must not block on
/// I/O there.
#[async_trait]
pub trait ForegroundHost: Send + Sync {
    /// Platform API level (Android SDK int). Desktop hosts return `0`.
    fn api_level(&self) -> u32;

    /// Promote the service to foreground and show the notification.
    fn start_foreground(&self, notification: NotificationDescriptor) -> Result<()>;

    /// Replace the visible notification content.
    async fn update_notification(&self, notification: NotificationDescriptor) -> Result<()>;

    /// Leave foreground state, optionally removing the notification.
    async fn stop_foreground(&self, remove_notification: bool) -> Result<()>;
}
