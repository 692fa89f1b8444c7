//! Foreground host for desktop processes
//!
//! Desktops have no foreground-service concept; the notification is recorded
//! and logged so the playback service can be driven identically everywhere.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    foreground::{ForegroundHost, NotificationDescriptor},
};
use parking_lot::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct ForegroundState {
    foreground: bool,
    notification: Option<NotificationDescriptor>,
    promotions: usize,
}

/// Desktop [`ForegroundHost`]: records promotion and notification content.
#[derive(Debug, Default)]
pub struct DesktopForegroundHost {
    api_level: u32,
    state: Mutex<ForegroundState>,
}

impl DesktopForegroundHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a specific platform API level, e.g. to exercise the foreground
    /// start path off-device.
    pub fn with_api_level(api_level: u32) -> Self {
        Self {
            api_level,
            ..Self::default()
        }
    }

    pub fn is_foreground(&self) -> bool {
        self.state.lock().foreground
    }

    /// Notification currently shown, if any.
    pub fn current_notification(&self) -> Option<NotificationDescriptor> {
        self.state.lock().notification.clone()
    }

    /// Number of times the service promoted itself to foreground.
    pub fn promotions(&self) -> usize {
        self.state.lock().promotions
    }
}

#[async_trait]
impl ForegroundHost for DesktopForegroundHost {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn start_foreground(&self, notification: NotificationDescriptor) -> Result<()> {
        info!(
            channel = %notification.channel_id,
            title = %notification.title,
            "Service promoted to foreground"
        );
        let mut state = self.state.lock();
        state.foreground = true;
        state.promotions += 1;
        state.notification = Some(notification);
        Ok(())
    }

    async fn update_notification(&self, notification: NotificationDescriptor) -> Result<()> {
        debug!(
            title = %notification.title,
            playing = notification.playing,
            "Notification updated"
        );
        self.state.lock().notification = Some(notification);
        Ok(())
    }

    async fn stop_foreground(&self, remove_notification: bool) -> Result<()> {
        debug!(remove_notification, "Leaving foreground");
        let mut state = self.state.lock();
        state.foreground = false;
        if remove_notification {
            state.notification = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_foreground_lifecycle() {
        let host = DesktopForegroundHost::new();
        assert_eq!(host.api_level(), 0);

        host.start_foreground(NotificationDescriptor::new("playback", "Loading"))
            .unwrap();
        assert!(host.is_foreground());
        assert_eq!(host.promotions(), 1);

        host.update_notification(NotificationDescriptor::new("playback", "Song"))
            .await
            .unwrap();
        assert_eq!(host.current_notification().unwrap().title, "Song");

        host.stop_foreground(false).await.unwrap();
        assert!(!host.is_foreground());
        assert!(host.current_notification().is_some());

        host.stop_foreground(true).await.unwrap();
        assert!(host.current_notification().is_none());
    }
}
