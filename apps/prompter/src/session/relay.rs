use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::{ConnectedClients, PlaybackState, StateSnapshot};
use crate::playback::apply_command;
use crate::protocol::{Envelope, Inbound};
use crate::transport::{Transport, TransportEvent};

/// Folds `CONTROL` messages into the authoritative playback record and answers
/// with revisioned `STATE_UPDATE` snapshots.
#[derive(Debug, Clone, Default)]
pub struct StateRelay {
    state: PlaybackState,
    revision: u64,
    clients: Option<ConnectedClients>,
}

impl StateRelay {
    pub fn new(state: PlaybackState) -> Self {
        Self {
            state: state.normalized(),
            revision: 0,
            clients: None,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_connected_clients(&mut self, clients: ConnectedClients) {
        self.clients = Some(clients);
    }

    /// Reply to broadcast for one inbound envelope, if any.
    pub fn handle(&mut self, envelope: Envelope) -> Option<Envelope> {
        match Inbound::try_from(envelope) {
            Ok(Inbound::Control(command)) => match apply_command(&mut self.state, &command) {
                Ok(_) => Some(self.publish()),
                Err(err) => {
                    warn!(
                        target = "prompter.relay",
                        action = ?command.action(),
                        error = %err,
                        "rejected control"
                    );
                    // Peers that applied it optimistically converge on this.
                    Some(self.publish())
                }
            },
            Ok(Inbound::GetState) => Some(self.publish()),
            Ok(Inbound::State(_)) | Ok(Inbound::Position(_)) => None,
            Err(err) => {
                warn!(target = "prompter.relay", error = %err, "dropping invalid message");
                None
            }
        }
    }

    fn publish(&mut self) -> Envelope {
        self.revision += 1;
        let mut snapshot = StateSnapshot::new(self.state.clone()).with_revision(self.revision);
        snapshot.connected_clients = self.clients;
        Envelope::state(snapshot)
    }
}

/// Runs a relay over `transport` until the task is aborted.
pub fn spawn_relay(
    transport: Arc<dyn Transport>,
    mut relay: StateRelay,
    reconnect_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match transport.recv().await {
                TransportEvent::Message(envelope) => {
                    if let Some(reply) = relay.handle(envelope) {
                        if let Err(err) = transport.send(&reply) {
                            warn!(target = "prompter.relay", error = %err, "snapshot not sent");
                        }
                    }
                }
                TransportEvent::Closed => {
                    warn!(target = "prompter.relay", "link closed; retrying");
                    loop {
                        tokio::time::sleep(reconnect_delay).await;
                        match transport.reconnect().await {
                            Ok(()) => {
                                info!(target = "prompter.relay", "relay reconnected");
                                break;
                            }
                            Err(err) => debug!(target = "prompter.relay", error = %err, "reconnect failed"),
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ControlCommand;

    fn revision_of(envelope: Option<Envelope>) -> (PlaybackState, Option<u64>) {
        match envelope {
            Some(Envelope::StateUpdate { data }) => (data.state, data.revision),
            other => panic!("expected a state update, got {other:?}"),
        }
    }

    #[test]
    fn controls_fold_into_revisioned_snapshots() {
        let mut relay = StateRelay::default();
        let (state, first) = revision_of(relay.handle(Envelope::control(&ControlCommand::LoadScript(
            Some("pilot".into()),
        ))));
        assert_eq!(state.current_script_id.as_deref(), Some("pilot"));
        let (state, second) = revision_of(relay.handle(Envelope::control(&ControlCommand::Play)));
        assert!(state.is_playing);
        assert!(second > first);
    }

    #[test]
    fn invalid_control_republishes_current_state() {
        let mut relay = StateRelay::default();
        let (state, revision) = revision_of(relay.handle(Envelope::control(&ControlCommand::Play)));
        assert!(!state.is_playing);
        assert_eq!(revision, Some(1));
    }

    #[test]
    fn get_state_is_answered_and_echoes_are_ignored() {
        let mut relay = StateRelay::new(PlaybackState::default());
        relay.set_connected_clients(ConnectedClients {
            admin: 1,
            viewer: 2,
            remote: 0,
        });
        let reply = relay.handle(Envelope::GetState);
        let Some(Envelope::StateUpdate { data }) = reply.clone() else {
            panic!("expected a snapshot");
        };
        assert_eq!(data.connected_clients.map(|c| c.viewer), Some(2));
        assert_eq!(relay.handle(reply.expect("reply")), None);
    }
}
