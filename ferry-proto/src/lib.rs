//! Ferry Protocol Definitions
//!
//! Events exchanged over the relay's WebSocket. Every frame is a JSON text
//! message tagged by its `type` field.
//!
//! ```text
//! server → {"type":"assigned","identifier":"calm-moon-42"}
//! client → {"type":"store","identifier":"calm-moon-42","content":"hi"}
//! client → {"type":"fetch","identifier":"calm-moon-42"}
//! server → {"type":"message","identifier":"calm-moon-42","content":"hi","expires_in_secs":86400}
//! client → {"type":"fetch","identifier":"wild-leaf-3"}
//! server → {"type":"not_found","identifier":"wild-leaf-3"}
//! ```

use serde::{Deserialize, Serialize};

/// Path the gateway serves its WebSocket on
pub const WS_PATH: &str = "/ws";

/// Maximum identifier length accepted by the gateway (256 bytes)
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

/// Requests a peer can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Store `content` under `identifier`, replacing anything already there.
    Store {
        identifier: String,
        content: String,
    },

    /// Ask for the content stored under `identifier`.
    Fetch { identifier: String },
}

/// Events the gateway sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection: the identifier this peer may store under.
    Assigned { identifier: String },

    /// A fetch hit.
    Message {
        identifier: String,
        content: String,
        /// Whole seconds until the entry stops being retrievable
        expires_in_secs: u64,
    },

    /// A fetch miss. The identifier was never stored or has expired.
    NotFound { identifier: String },

    /// The last frame was rejected and did not reach the store.
    Error { message: String },
}

impl ClientEvent {
    /// Parses a text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes into a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Name used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::Store { .. } => "store",
            ClientEvent::Fetch { .. } => "fetch",
        }
    }
}

impl ServerEvent {
    /// Parses a text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes into a text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Name used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::Assigned { .. } => "assigned",
            ServerEvent::Message { .. } => "message",
            ServerEvent::NotFound { .. } => "not_found",
            ServerEvent::Error { .. } => "error",
        }
    }
}
