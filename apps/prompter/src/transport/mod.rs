use async_trait::async_trait;
use prompter_bus::BusError;
use thiserror::Error;

use crate::protocol::Envelope;

pub mod bus;
pub mod websocket;

pub use bus::BusTransport;
pub use websocket::WebSocketTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("transport closed")]
    Closed,
    #[error("envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("connect failed: {0}")]
    Connect(String),
}

impl From<BusError> for TransportError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Closed => TransportError::Closed,
            other => TransportError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(Envelope),
    /// The link dropped. Nothing more arrives until [`Transport::reconnect`] succeeds.
    Closed,
}

/// Duplex broadcast link to every peer in the room, this one included.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Best-effort send; fails fast instead of queueing while the link is down.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Next decodable envelope. Malformed frames are skipped with a warning.
    async fn recv(&self) -> TransportEvent;

    async fn reconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}
