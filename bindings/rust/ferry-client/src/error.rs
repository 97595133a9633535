//! Error types for the Ferry client.

use thiserror::Error;

/// Errors that can occur when using the Ferry client.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to connect to the server
    #[error("Connection error: {0}")]
    Connection(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A frame could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request was refused, by the server or before it was sent
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The server sent an event that does not answer the request
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server did not answer in time; the connection is dropped afterwards
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The connection was closed, by the server or after a timeout
    #[error("Connection closed")]
    Closed,
}

impl Error {
    /// Returns `true` if the request was refused rather than failing in transit.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }
}
