use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use prompter_bus::{Bus, BusMessage, LinkState};
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tracing::{debug, warn};

use super::{Transport, TransportError, TransportEvent};
use crate::protocol::Envelope;

/// [`Transport`] over a `prompter-bus` room topic.
pub struct BusTransport<B: Bus> {
    bus: Arc<B>,
    topic: String,
    inbox: AsyncMutex<broadcast::Receiver<BusMessage>>,
    link: AsyncMutex<watch::Receiver<LinkState>>,
    status: watch::Receiver<LinkState>,
}

impl<B: Bus> BusTransport<B> {
    pub fn new(bus: Arc<B>, room: &str) -> Self {
        let topic = room_topic(room);
        let inbox = bus.subscribe(&topic);
        let link = bus.link();
        let status = bus.link();
        Self {
            bus,
            topic,
            inbox: AsyncMutex::new(inbox),
            link: AsyncMutex::new(link),
            status,
        }
    }
}

pub fn room_topic(room: &str) -> String {
    format!("prompter/{room}")
}

#[async_trait]
impl<B: Bus + 'static> Transport for BusTransport<B> {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let payload = envelope.to_json()?;
        self.bus.publish(&self.topic, Bytes::from(payload))?;
        Ok(())
    }

    async fn recv(&self) -> TransportEvent {
        let mut inbox = self.inbox.lock().await;
        let mut link = self.link.lock().await;
        loop {
            if *link.borrow_and_update() == LinkState::Down {
                return TransportEvent::Closed;
            }
            tokio::select! {
                changed = link.changed() => {
                    if changed.is_err() {
                        return TransportEvent::Closed;
                    }
                }
                message = inbox.recv() => match message {
                    Ok(message) => match Envelope::from_slice(&message.payload) {
                        Ok(envelope) => return TransportEvent::Message(envelope),
                        Err(err) => {
                            warn!(
                                target = "prompter.transport",
                                topic = %self.topic,
                                error = %err,
                                "dropping undecodable frame"
                            );
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(target = "prompter.transport", skipped, "bus receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return TransportEvent::Closed,
                },
            }
        }
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.bus.reconnect()?;
        // Whatever queued up while the link was down is stale.
        *self.inbox.lock().await = self.bus.subscribe(&self.topic);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.status.borrow() == LinkState::Up
    }
}
