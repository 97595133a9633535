//! # Ferry Client
//!
//! An async Rust client for the Ferry relay.
//!
//! A connection is assigned an identifier by the server as soon as it opens.
//! Content stored under that identifier can be fetched by anyone who knows it,
//! from any connection, until it expires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferry_client::FerryClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferry_client::Error> {
//!     let producer = FerryClient::connect("ws://localhost:9090/ws").await?;
//!     let identifier = producer.publish("see you at noon").await?;
//!
//!     let consumer = FerryClient::connect("ws://localhost:9090/ws").await?;
//!     match consumer.fetch(&identifier).await? {
//!         Some(content) => println!("{}: {}", identifier, content),
//!         None => println!("{} not found", identifier),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Rejected stores
//!
//! Stores are fire-and-forget. If the server rejects one (for example because
//! the content exceeds its size limit) the rejection arrives later as an
//! `error` event; the client logs it and skips it while waiting for the next
//! fetch reply.

mod error;
mod options;

pub use error::Error;
pub use options::FerryClientOptions;

use ferry_proto::{ClientEvent, ServerEvent, MAX_IDENTIFIER_LENGTH};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A fetch hit with its remaining lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub content: String,
    pub expires_in: Duration,
}

/// A client for the Ferry relay.
///
/// Requests on one client are serialized over a single WebSocket, so every
/// fetch reply is matched to the fetch that caused it. The client can be
/// cloned cheaply (it uses internal Arc); clones share the connection.
///
/// A fetch that times out leaves its reply in flight, so the connection is
/// closed and every later call returns [`Error::Closed`]. Connect again to
/// continue.
#[derive(Clone)]
pub struct FerryClient {
    inner: Arc<Mutex<Connection>>,
    identifier: Arc<str>,
    timeout: Duration,
    broken: Arc<AtomicBool>,
}

fn validate_identifier(identifier: &str) -> Result<(), Error> {
    if identifier.is_empty() {
        return Err(Error::Rejected("identifier cannot be empty".to_string()));
    }
    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::Rejected(format!(
            "identifier exceeds maximum length of {} bytes",
            MAX_IDENTIFIER_LENGTH
        )));
    }
    Ok(())
}

impl FerryClient {
    /// Connect to a Ferry gateway with default options.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        Self::with_options(FerryClientOptions::new(url)).await
    }

    /// Connect to a Ferry gateway with custom options.
    ///
    /// Completes once the server has assigned this connection its identifier.
    pub async fn with_options(options: FerryClientOptions) -> Result<Self, Error> {
        let (mut connection, _) = tokio::time::timeout(
            options.timeout,
            tokio_tungstenite::connect_async(options.url.as_str()),
        )
        .await
        .map_err(|_| Error::Connection(format!("timed out connecting to {}", options.url)))?
        .map_err(|e| Error::Connection(e.to_string()))?;

        let first = tokio::time::timeout(options.timeout, next_event(&mut connection))
            .await
            .map_err(|_| Error::Connection("timed out waiting for identifier".to_string()))??;

        let identifier = match first {
            ServerEvent::Assigned { identifier } => identifier,
            other => {
                return Err(Error::Protocol(format!(
                    "expected assigned identifier, got {}",
                    other.event_type()
                )))
            }
        };
        tracing::debug!(%identifier, "connected to relay");

        Ok(Self {
            inner: Arc::new(Mutex::new(connection)),
            identifier: Arc::from(identifier),
            timeout: options.timeout,
            broken: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Locks the connection unless an earlier timeout desynchronized it
    async fn connection(&self) -> Result<tokio::sync::MutexGuard<'_, Connection>, Error> {
        let connection = self.inner.lock().await;
        if self.broken.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(connection)
    }

    /// The identifier the server assigned to this connection.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Store `content` under `identifier`, replacing anything already there.
    pub async fn store(&self, identifier: &str, content: impl Into<String>) -> Result<(), Error> {
        validate_identifier(identifier)?;
        let event = ClientEvent::Store {
            identifier: identifier.to_string(),
            content: content.into(),
        };

        let mut connection = self.connection().await?;
        send_event(&mut connection, &event).await
    }

    /// Store `content` under this connection's own identifier and return it.
    pub async fn publish(&self, content: impl Into<String>) -> Result<String, Error> {
        self.store(&self.identifier, content).await?;
        Ok(self.identifier.to_string())
    }

    /// Fetch the content stored under `identifier`.
    ///
    /// Returns `Ok(None)` if nothing live is stored there. Stored empty
    /// content comes back as `Ok(Some(String::new()))`.
    pub async fn fetch(&self, identifier: &str) -> Result<Option<String>, Error> {
        Ok(self.fetch_entry(identifier).await?.map(|fetched| fetched.content))
    }

    /// Like [`fetch`](Self::fetch), also reporting how long the entry has left.
    pub async fn fetch_entry(&self, identifier: &str) -> Result<Option<Fetched>, Error> {
        validate_identifier(identifier)?;
        let event = ClientEvent::Fetch {
            identifier: identifier.to_string(),
        };

        let mut connection = self.connection().await?;
        send_event(&mut connection, &event).await?;

        let reply = tokio::time::timeout(self.timeout, await_fetch_reply(&mut connection, identifier)).await;
        match reply {
            Ok(reply) => reply,
            Err(_) => {
                self.broken.store(true, Ordering::Release);
                if let Err(e) = connection.close(None).await {
                    tracing::debug!(error = %e, "close after fetch timeout failed");
                }
                tracing::warn!(timeout = ?self.timeout, "fetch timed out, connection dropped");
                Err(Error::Timeout(self.timeout))
            }
        }
    }

    /// Close the connection. Stored entries are unaffected.
    pub async fn close(&self) -> Result<(), Error> {
        let mut connection = self.connection().await?;
        connection.close(None).await?;
        Ok(())
    }
}

async fn send_event(connection: &mut Connection, event: &ClientEvent) -> Result<(), Error> {
    connection.send(Message::Text(event.to_json()?)).await?;
    Ok(())
}

/// Reads the next JSON event, skipping control frames
async fn next_event(connection: &mut Connection) -> Result<ServerEvent, Error> {
    while let Some(msg) = connection.next().await {
        match msg? {
            Message::Text(text) => return Ok(ServerEvent::from_json(&text)?),
            Message::Close(_) => return Err(Error::Closed),
            _ => continue,
        }
    }
    Err(Error::Closed)
}

async fn await_fetch_reply(connection: &mut Connection, identifier: &str) -> Result<Option<Fetched>, Error> {
    loop {
        match next_event(connection).await? {
            ServerEvent::Message {
                identifier: got,
                content,
                expires_in_secs,
            } if got == identifier => {
                return Ok(Some(Fetched {
                    content,
                    expires_in: Duration::from_secs(expires_in_secs),
                }))
            }
            ServerEvent::NotFound { identifier: got } if got == identifier => return Ok(None),
            // Answers an earlier store
            ServerEvent::Error { message } => {
                tracing::warn!(%message, "server rejected an earlier store");
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected {} while waiting for fetch reply",
                    other.event_type()
                )))
            }
        }
    }
}
