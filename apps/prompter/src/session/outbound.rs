//! Outbound capabilities, chosen once per surface from its [`Role`].
//!
//! A read-only surface gets no-op senders at construction, so no code path on
//! it can put a position or control message on the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::SyncResult;
use crate::model::PositionAnchor;
use crate::protocol::{ControlCommand, Envelope, PositionKind};
use crate::session::Role;
use crate::telemetry::{PerfGuard, record_count};
use crate::transport::Transport;

pub trait AnchorSender: Send + Sync {
    fn send_anchor(&self, kind: PositionKind, anchor: &PositionAnchor) -> SyncResult<()>;

    /// Anchors actually handed to the transport.
    fn sent(&self) -> u64;
}

pub trait ControlSender: Send + Sync {
    fn send_control(&self, command: &ControlCommand) -> SyncResult<()>;

    fn sent(&self) -> u64;
}

pub struct TransportAnchorSender {
    transport: Arc<dyn Transport>,
    sent: AtomicU64,
}

impl TransportAnchorSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sent: AtomicU64::new(0),
        }
    }
}

impl AnchorSender for TransportAnchorSender {
    fn send_anchor(&self, kind: PositionKind, anchor: &PositionAnchor) -> SyncResult<()> {
        let _perf = PerfGuard::new("outbound.anchor");
        self.transport
            .send(&Envelope::position(kind, anchor.clone()))?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        record_count("outbound.anchor.sent");
        Ok(())
    }

    fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

pub struct TransportControlSender {
    transport: Arc<dyn Transport>,
    sent: AtomicU64,
}

impl TransportControlSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sent: AtomicU64::new(0),
        }
    }
}

impl ControlSender for TransportControlSender {
    fn send_control(&self, command: &ControlCommand) -> SyncResult<()> {
        self.transport.send(&Envelope::control(command))?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        record_count("outbound.control.sent");
        Ok(())
    }

    fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct NoopAnchorSender {
    suppressed: AtomicU64,
}

impl NoopAnchorSender {
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }
}

impl AnchorSender for NoopAnchorSender {
    fn send_anchor(&self, kind: PositionKind, _anchor: &PositionAnchor) -> SyncResult<()> {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
        record_count("outbound.anchor.suppressed");
        trace!(target = "prompter.surface", ?kind, "read-only surface dropped position");
        Ok(())
    }

    fn sent(&self) -> u64 {
        0
    }
}

#[derive(Default)]
pub struct NoopControlSender {
    suppressed: AtomicU64,
}

impl ControlSender for NoopControlSender {
    fn send_control(&self, command: &ControlCommand) -> SyncResult<()> {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
        trace!(target = "prompter.surface", action = ?command.action(), "read-only surface dropped control");
        Ok(())
    }

    fn sent(&self) -> u64 {
        0
    }
}

/// Everything a surface may put on the wire.
pub struct Outbound {
    anchors: Box<dyn AnchorSender>,
    controls: Box<dyn ControlSender>,
    transport: Arc<dyn Transport>,
}

impl Outbound {
    pub fn for_role(role: Role, transport: Arc<dyn Transport>) -> Self {
        let (anchors, controls): (Box<dyn AnchorSender>, Box<dyn ControlSender>) =
            if role.is_read_only() {
                (
                    Box::new(NoopAnchorSender::default()),
                    Box::new(NoopControlSender::default()),
                )
            } else {
                (
                    Box::new(TransportAnchorSender::new(Arc::clone(&transport))),
                    Box::new(TransportControlSender::new(Arc::clone(&transport))),
                )
            };
        Self {
            anchors,
            controls,
            transport,
        }
    }

    pub fn send_anchor(&self, kind: PositionKind, anchor: &PositionAnchor) -> SyncResult<()> {
        self.anchors.send_anchor(kind, anchor)
    }

    pub fn send_control(&self, command: &ControlCommand) -> SyncResult<()> {
        self.controls.send_control(command)
    }

    /// `GET_STATE` is allowed for every role; it carries no position or control.
    pub fn request_state(&self) -> SyncResult<()> {
        self.transport.send(&Envelope::GetState)?;
        Ok(())
    }

    pub fn anchors_sent(&self) -> u64 {
        self.anchors.sent()
    }

    pub fn controls_sent(&self) -> u64 {
        self.controls.sent()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnchorOrigin;
    use crate::transport::{BusTransport, TransportEvent};
    use prompter_bus::LocalHub;

    #[tokio::test]
    async fn read_only_outbound_never_reaches_the_wire() {
        let hub = LocalHub::new();
        let viewer: Arc<dyn Transport> = Arc::new(BusTransport::new(Arc::new(hub.attach()), "studio"));
        let observer = BusTransport::new(Arc::new(hub.attach()), "studio");
        let outbound = Outbound::for_role(Role::ReadOnly, viewer);

        let anchor = PositionAnchor::for_text("B", AnchorOrigin::Unspecified).with_index(1, 3);
        outbound.send_anchor(PositionKind::Sync, &anchor).expect("noop");
        outbound.send_control(&ControlCommand::Play).expect("noop");
        outbound.request_state().expect("get state");

        assert_eq!(outbound.anchors_sent(), 0);
        assert_eq!(outbound.controls_sent(), 0);
        assert_eq!(observer.recv().await, TransportEvent::Message(Envelope::GetState));
    }

    #[tokio::test]
    async fn writable_outbound_counts_what_it_sends() {
        let hub = LocalHub::new();
        let admin: Arc<dyn Transport> = Arc::new(BusTransport::new(Arc::new(hub.attach()), "studio"));
        let outbound = Outbound::for_role(Role::Initiator, admin);
        let anchor = PositionAnchor::at_beginning(AnchorOrigin::Admin);
        outbound.send_anchor(PositionKind::Search, &anchor).expect("send");
        assert_eq!(outbound.anchors_sent(), 1);
    }
}
