//! # Playback Error Types
//!
//! Error types for the playback service, its controller handle and the
//! connection machinery around it.

use bridge_traits::error::BridgeError;
use bridge_traits::playback::PlaybackStatus;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// The controller outlived the service instance that issued it.
    #[error("Playback service unavailable")]
    ServiceUnavailable,

    /// The service is not bound and no controller is published.
    #[error("Playback service not connected")]
    NotConnected,

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// The command is not legal in the current state. State is unchanged.
    #[error("Cannot {command} while {status}: {reason}")]
    InvalidCommand {
        command: &'static str,
        status: PlaybackStatus,
        reason: String,
    },

    // ========================================================================
    // Preparing Errors
    // ========================================================================
    /// The catalog could not resolve the track.
    #[error("Catalog lookup failed for {track_id}: {message}")]
    Catalog { track_id: String, message: String },

    /// The native engine rejected or lost the stream.
    #[error("Playback engine error: {0}")]
    Engine(String),

    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// Foreground promotion failed at service start.
    #[error("Foreground promotion failed: {0}")]
    ForegroundPromotion(String),

    /// Error surfaced by a host bridge.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub(crate) fn invalid(
        command: &'static str,
        status: PlaybackStatus,
        reason: impl Into<String>,
    ) -> Self {
        PlaybackError::InvalidCommand {
            command,
            status,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Bridge(err) => err.is_timeout(),
            PlaybackError::Catalog { .. } | PlaybackError::NotConnected => true,
            _ => false,
        }
    }

    /// Returns `true` if the session survives this error and accepts new
    /// commands.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PlaybackError::ServiceUnavailable
                | PlaybackError::ForegroundPromotion(_)
                | PlaybackError::Internal(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
