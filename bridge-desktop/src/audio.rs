//! Audio focus on desktop
//!
//! Desktop mixers let every application play at once, so focus is always
//! granted. Holding state is tracked for diagnostics only.

use async_trait::async_trait;
use bridge_traits::{error::Result, playback::AudioFocus};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
pub struct DesktopAudioFocus {
    held: AtomicBool,
}

impl DesktopAudioFocus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioFocus for DesktopAudioFocus {
    async fn request_focus(&self) -> Result<bool> {
        self.held.store(true, Ordering::SeqCst);
        trace!("Audio focus granted");
        Ok(true)
    }

    async fn abandon_focus(&self) -> Result<()> {
        self.held.store(false, Ordering::SeqCst);
        trace!("Audio focus abandoned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_focus_always_granted() {
        let focus = DesktopAudioFocus::new();
        assert!(focus.request_focus().await.unwrap());
        assert!(focus.is_held());
        focus.abandon_focus().await.unwrap();
        assert!(!focus.is_held());
    }
}
