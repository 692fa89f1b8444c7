//! Cloud Music Catalog Abstraction
//!
//! The catalog client is an external collaborator: the core hands it a track
//! identifier and gets back something playable. Any error it reports is
//! treated by the playback service as a failure of the Preparing phase.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Playable metadata resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableTrack {
    pub track_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub stream_url: String,
    pub duration: Option<Duration>,
}

impl PlayableTrack {
    pub fn new(
        track_id: impl Into<String>,
        title: impl Into<String>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            title: title.into(),
            artist: None,
            stream_url: stream_url.into(),
            duration: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }
}

/// Opaque request/response interface to the music catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Resolve a track identifier into playable metadata and a stream URL.
    async fn resolve(&self, track_id: &str) -> Result<PlayableTrack>;
}
