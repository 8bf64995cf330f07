//! Duplex broadcast channel for prompter surfaces.
//!
//! Every peer attached to a [`LocalHub`] receives every message published on a
//! topic it subscribed to, including the messages it published itself. Delivery
//! is at-least-once within the process and unordered across senders. A peer's
//! link can be severed to model a dropped connection; while it is down the peer
//! cannot publish and the transport layer discards whatever it would have
//! received.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::trace;
use uuid::Uuid;

pub type PeerId = Uuid;

const DEFAULT_TOPIC_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub sender: PeerId,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
    #[error("peer link is down")]
    Disconnected,
    #[error("bus transport error: {0}")]
    Transport(String),
}

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

pub trait Bus: Send + Sync {
    fn peer_id(&self) -> PeerId;
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage>;
    fn publish(&self, topic: &str, payload: Bytes) -> BusResult<()>;
    /// Watch handle that flips to [`LinkState::Down`] when the peer loses its link.
    fn link(&self) -> watch::Receiver<LinkState>;
    fn reconnect(&self) -> BusResult<()>;
}

/// Fan-out point shared by all peers in this process.
#[derive(Debug)]
pub struct LocalHub {
    topics: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
    capacity: usize,
    accepting: AtomicBool,
}

impl LocalHub {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            accepting: AtomicBool::new(true),
        })
    }

    pub fn attach(self: &Arc<Self>) -> LocalPeer {
        let (link, _) = watch::channel(LinkState::Up);
        LocalPeer {
            hub: Arc::clone(self),
            id: Uuid::new_v4(),
            link,
        }
    }

    /// While not accepting, severed peers cannot reconnect.
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        let mut guard = self.topics.write();
        guard
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

/// One peer's handle onto a [`LocalHub`].
#[derive(Debug)]
pub struct LocalPeer {
    hub: Arc<LocalHub>,
    id: PeerId,
    link: watch::Sender<LinkState>,
}

impl LocalPeer {
    pub fn sever(&self) {
        self.link.send_replace(LinkState::Down);
    }

    pub fn is_up(&self) -> bool {
        *self.link.borrow() == LinkState::Up
    }
}

impl Bus for LocalPeer {
    fn peer_id(&self) -> PeerId {
        self.id
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.hub.sender_for(topic).subscribe()
    }

    fn publish(&self, topic: &str, payload: Bytes) -> BusResult<()> {
        if !self.is_up() {
            return Err(BusError::Disconnected);
        }
        let sender = self.hub.sender_for(topic);
        let message = BusMessage {
            topic: topic.to_string(),
            sender: self.id,
            payload,
        };
        if sender.send(message).is_err() {
            trace!(target = "prompter.bus", topic, "published with no subscribers");
        }
        Ok(())
    }

    fn link(&self) -> watch::Receiver<LinkState> {
        self.link.subscribe()
    }

    fn reconnect(&self) -> BusResult<()> {
        if !self.hub.is_accepting() {
            return Err(BusError::Transport("hub is not accepting peers".into()));
        }
        self.link.send_replace(LinkState::Up);
        Ok(())
    }
}
