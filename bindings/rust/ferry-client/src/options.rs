//! Client configuration options.

use std::time::Duration;

const DEFAULT_URL: &str = "ws://127.0.0.1:9090/ws";

/// Options for configuring the Ferry client connection.
///
/// # Example
///
/// ```rust
/// use ferry_client::FerryClientOptions;
/// use std::time::Duration;
///
/// let options = FerryClientOptions::new("ws://localhost:9090/ws")
///     .with_timeout(Duration::from_secs(3));
/// ```
#[derive(Clone, Debug)]
pub struct FerryClientOptions {
    /// The gateway WebSocket URL (e.g., "ws://localhost:9090/ws")
    pub url: String,

    /// How long to wait for the handshake and for each fetch reply
    pub timeout: Duration,
}

impl FerryClientOptions {
    /// Create new options with the given gateway URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the handshake and reply timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create options from environment variables.
    ///
    /// Reads:
    /// - `FERRY_SERVER_URL` - Gateway URL (defaults to "ws://127.0.0.1:9090/ws")
    pub fn from_env() -> Self {
        let url = std::env::var("FERRY_SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(url)
    }
}

impl Default for FerryClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}
