use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::UserId;

/// Frames accepted from a connected client
///
/// The envelope is a JSON object tagged by `type`. An envelope whose tag is
/// well formed but unrecognized deserializes to [`ClientFrame::Unknown`] so
/// the connection loop can skip it instead of tearing the connection down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Chat line for everyone currently connected
    Chat { message: String },

    /// Direct notification for a single user
    Notification {
        target_user_id: String,
        message: String,
    },

    /// Envelope with an unrecognized `type` tag
    #[serde(other)]
    Unknown,
}

/// Frames the server pushes to connected clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Chat line fanned out to everyone, stamped with the sender's identity
    /// and the delivery time
    Chat {
        user_id: UserId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Notification delivered to exactly one recipient
    Notification { message: String },
}

impl ClientFrame {
    /// Parse one inbound text frame.
    ///
    /// Unparseable JSON or a missing required field is a protocol violation
    /// and should terminate the connection; an unrecognized `type` tag is
    /// not, it parses to [`ClientFrame::Unknown`].
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ProtocolViolation(e.to_string()))
    }

    /// Get a short description of the frame type
    #[must_use]
    pub const fn frame_type(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Notification { .. } => "notification",
            Self::Unknown => "unknown",
        }
    }
}

impl ServerFrame {
    /// Get a short description of the frame type
    #[must_use]
    pub const fn frame_type(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Notification { .. } => "notification",
        }
    }
}
