//! WebSocket gateway
//!
//! Every connection gets a fresh identifier, then a request/response loop:
//! each text frame is parsed as a [`ClientEvent`], validated, and applied to
//! the shared [`Store`]. Fetches are answered on the same socket; stores are
//! fire-and-forget. Rejected frames are answered with an `error` event and
//! never reach the store. Entries are not tied to the connection that wrote
//! them and survive its disconnect.

use crate::identifier;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use ferry_core::Store;
use ferry_proto::{ClientEvent, ServerEvent, MAX_IDENTIFIER_LENGTH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a frame is turned away at the boundary
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("identifier cannot be empty")]
    EmptyIdentifier,

    #[error("identifier exceeds maximum length of {max} bytes")]
    IdentifierTooLong { max: usize },

    #[error("content exceeds maximum length of {max} bytes")]
    ContentTooLong { max: usize },

    #[error("binary frames are not supported")]
    BinaryFrame,
}

impl GatewayError {
    fn into_event(self) -> ServerEvent {
        ServerEvent::Error {
            message: self.to_string(),
        }
    }
}

/// Truncates an identifier for logging
fn truncate_identifier_for_log(identifier: &str) -> String {
    const MAX_LOG_CHARS: usize = 16;
    if identifier.chars().count() <= MAX_LOG_CHARS {
        identifier.to_string()
    } else {
        let head: String = identifier.chars().take(MAX_LOG_CHARS).collect();
        format!("{}...", head)
    }
}

fn validate_identifier(identifier: &str) -> Result<(), GatewayError> {
    if identifier.is_empty() {
        return Err(GatewayError::EmptyIdentifier);
    }
    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(GatewayError::IdentifierTooLong {
            max: MAX_IDENTIFIER_LENGTH,
        });
    }
    Ok(())
}

/// Translates peer events into store calls
#[derive(Clone)]
pub struct Gateway {
    store: Store,
    max_content_bytes: usize,
}

impl Gateway {
    pub fn new(store: Store, max_content_bytes: usize) -> Self {
        Self {
            store,
            max_content_bytes,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn validate_content(&self, content: &str) -> Result<(), GatewayError> {
        if content.len() > self.max_content_bytes {
            return Err(GatewayError::ContentTooLong {
                max: self.max_content_bytes,
            });
        }
        Ok(())
    }

    /// Applies one event to the store, returning the reply if the event has one
    pub fn handle_event(&self, event: ClientEvent) -> Result<Option<ServerEvent>, GatewayError> {
        match event {
            ClientEvent::Store { identifier, content } => {
                validate_identifier(&identifier)?;
                self.validate_content(&content)?;
                debug!(
                    replaces = self.store.contains_key(&identifier),
                    "STORE {} ({} bytes)",
                    truncate_identifier_for_log(&identifier),
                    content.len()
                );

                self.store.put(identifier, content);
                Ok(None)
            }
            ClientEvent::Fetch { identifier } => {
                validate_identifier(&identifier)?;

                let reply = match self.store.entry(&identifier) {
                    Some(entry) => {
                        debug!("FETCH {} → hit", truncate_identifier_for_log(&identifier));
                        ServerEvent::Message {
                            content: entry.content().to_string(),
                            expires_in_secs: entry.remaining().as_secs(),
                            identifier,
                        }
                    }
                    None => {
                        debug!("FETCH {} → miss", truncate_identifier_for_log(&identifier));
                        ServerEvent::NotFound { identifier }
                    }
                };
                Ok(Some(reply))
            }
        }
    }

    /// Parses and applies a text frame. Rejections come back as `error` events.
    pub fn handle_text(&self, text: &str) -> Option<ServerEvent> {
        let result = ClientEvent::from_json(text)
            .map_err(GatewayError::from)
            .and_then(|event| {
                debug!(event_type = event.event_type(), "received event");
                self.handle_event(event)
            });

        match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "rejected frame");
                Some(e.into_event())
            }
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(gateway): State<Gateway>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, gateway))
}

/// Runs for the lifetime of one peer connection
async fn handle_socket(mut socket: WebSocket, gateway: Gateway) {
    let identifier = identifier::generate();
    info!(%identifier, "peer connected");

    let assigned = ServerEvent::Assigned {
        identifier: identifier.clone(),
    };
    if let Err(e) = send_event(&mut socket, &assigned).await {
        warn!(%identifier, error = %e, "failed to send assigned identifier");
        return;
    }

    while let Some(msg) = socket.recv().await {
        let reply = match msg {
            Ok(Message::Text(text)) => gateway.handle_text(&text),
            Ok(Message::Binary(_)) => Some(GatewayError::BinaryFrame.into_event()),
            // Pong is automatically sent by axum
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
            Ok(Message::Close(_)) => {
                debug!(%identifier, "peer sent close frame");
                break;
            }
            Err(e) => {
                warn!(%identifier, error = %e, "WebSocket receive error");
                break;
            }
        };

        if let Some(reply) = reply {
            if let Err(e) = send_event(&mut socket, &reply).await {
                warn!(%identifier, error = %e, "failed to send reply, closing connection");
                break;
            }
        }
    }

    info!(%identifier, "peer disconnected");
}

/// Serializes the event to JSON and sends it as a text message
async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let json = event.to_json().map_err(axum::Error::new)?;
    debug!(event_type = event.event_type(), "sending event");
    socket.send(Message::Text(json)).await
}
