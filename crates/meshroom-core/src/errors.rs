//! Error types for the room coordinator
//!
//! Transport failures are modelled here so drivers can log them precisely, but the
//! coordinator itself never turns them into failed room operations: a room whose
//! transport never came up looks like a room with nobody else in it.

use crate::types::{HandleId, RoomId};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Specific transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open room {room_id}: {reason}")]
    OpenFailed { room_id: RoomId, reason: String },
    #[error("Send failed on handle {handle}: {reason}")]
    SendFailed { handle: HandleId, reason: String },
    #[error("No open transport handle {handle}")]
    HandleNotFound { handle: HandleId },
    #[error("Transport shutdown: {reason}")]
    Shutdown { reason: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error types for the room coordinator
#[derive(Debug, thiserror::Error)]
pub enum MeshroomError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel communication error between the coordinator task and its peers
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Invalid room id: {reason}")]
    InvalidRoomId { reason: String },

    #[error("Invalid share link: {reason}")]
    InvalidLink { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl MeshroomError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        MeshroomError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        MeshroomError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn invalid_room_id<T: Into<String>>(reason: T) -> Self {
        MeshroomError::InvalidRoomId {
            reason: reason.into(),
        }
    }

    pub fn invalid_link<T: Into<String>>(reason: T) -> Self {
        MeshroomError::InvalidLink {
            reason: reason.into(),
        }
    }

    /// Create a transport open failure
    pub fn open_failed<R: Into<String>>(room_id: RoomId, reason: R) -> Self {
        MeshroomError::Transport(TransportError::OpenFailed {
            room_id,
            reason: reason.into(),
        })
    }

    /// Create a transport send failure
    pub fn send_failed<R: Into<String>>(handle: HandleId, reason: R) -> Self {
        MeshroomError::Transport(TransportError::SendFailed {
            handle,
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, MeshroomError>;
pub type MeshroomResult<T> = Result<T>;
