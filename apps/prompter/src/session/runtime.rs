use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::error::{SyncError, SyncResult};
use crate::model::{ConnectedClients, PlaybackState, PositionAnchor, ScriptView};
use crate::playback::StateChanges;
use crate::protocol::ControlCommand;
use crate::session::{InboundOutcome, Surface, SurfaceKind};
use crate::sync::Resolution;
use crate::transport::{Transport, TransportEvent};

/// Stand-in deadline for disabled timer branches.
const IDLE: Duration = Duration::from_secs(60 * 60 * 24);

pub enum SurfaceCommand {
    Control(ControlCommand, oneshot::Sender<SyncResult<StateChanges>>),
    Scroll(f64),
    Resize(f64),
    Rollback(oneshot::Sender<SyncResult<Resolution>>),
    Search(String, oneshot::Sender<SyncResult<Resolution>>),
    Status(oneshot::Sender<SurfaceStatus>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStatus {
    pub kind: SurfaceKind,
    pub state: PlaybackState,
    pub scroll_top: f64,
    pub revision: Option<u64>,
    pub connected: bool,
    pub connected_clients: Option<ConnectedClients>,
    pub checkpoint: Option<PositionAnchor>,
    pub anchors_sent: u64,
    pub controls_sent: u64,
}

/// Handle onto a surface running on its own task.
pub struct SurfaceHandle {
    commands: mpsc::UnboundedSender<SurfaceCommand>,
    task: JoinHandle<()>,
}

impl SurfaceHandle {
    pub async fn command(&self, command: ControlCommand) -> SyncResult<StateChanges> {
        self.request(|reply| SurfaceCommand::Control(command, reply)).await?
    }

    pub fn scroll(&self, offset: f64) {
        let _ = self.commands.send(SurfaceCommand::Scroll(offset));
    }

    pub fn resize(&self, viewport_height: f64) {
        let _ = self.commands.send(SurfaceCommand::Resize(viewport_height));
    }

    pub async fn rollback(&self) -> SyncResult<Resolution> {
        self.request(SurfaceCommand::Rollback).await?
    }

    pub async fn search(&self, text: impl Into<String>) -> SyncResult<Resolution> {
        let text = text.into();
        self.request(|reply| SurfaceCommand::Search(text, reply)).await?
    }

    pub async fn status(&self) -> SyncResult<SurfaceStatus> {
        self.request(SurfaceCommand::Status).await
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(SurfaceCommand::Shutdown);
        let _ = self.task.await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SurfaceCommand,
    ) -> SyncResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SyncError::invalid("surface task has stopped"))?;
        response
            .await
            .map_err(|_| SyncError::invalid("surface task has stopped"))
    }
}

/// Drives `surface` on a single task: inbound traffic, local commands, the
/// debounce deadline, autoplay frames, checkpoint sampling, and reconnects.
/// Sends `GET_STATE` on start and after every reconnect.
pub fn spawn_surface<V>(surface: Surface<V>, transport: Arc<dyn Transport>) -> SurfaceHandle
where
    V: ScriptView + 'static,
{
    let (commands, inbox) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_surface(surface, transport, inbox));
    SurfaceHandle { commands, task }
}

async fn run_surface<V: ScriptView>(
    mut surface: Surface<V>,
    transport: Arc<dyn Transport>,
    mut inbox: mpsc::UnboundedReceiver<SurfaceCommand>,
) {
    let config = surface.sync().config.clone();
    let mut frames = interval(config.frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut checkpoints = interval(config.checkpoint_interval);
    checkpoints.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut connected = transport.is_connected();
    let mut reconnect_at = None;
    if connected {
        surface.request_state();
    } else {
        reconnect_at = Some(Instant::now() + config.reconnect_delay);
    }
    info!(
        target = "prompter.surface",
        surface = surface.kind().as_str(),
        connected,
        "surface started"
    );

    loop {
        let deadline = surface.next_deadline();
        let playing = surface.is_playing();
        tokio::select! {
            event = transport.recv(), if connected => match event {
                TransportEvent::Message(envelope) => {
                    let outcome = surface.handle_envelope(envelope, Instant::now());
                    log_outcome(&surface, &outcome);
                }
                TransportEvent::Closed => {
                    connected = false;
                    reconnect_at = Some(Instant::now() + config.reconnect_delay);
                    warn!(
                        target = "prompter.transport",
                        delay_ms = config.reconnect_delay.as_millis() as u64,
                        "transport closed; sends are dropped until reconnect"
                    );
                }
            },
            command = inbox.recv() => match command {
                None | Some(SurfaceCommand::Shutdown) => break,
                Some(command) => handle_command(&mut surface, command, &*transport),
            },
            _ = sleep_until(deadline.unwrap_or_else(|| Instant::now() + IDLE)), if deadline.is_some() => {
                surface.poll(Instant::now());
            }
            _ = frames.tick(), if playing => {
                surface.tick_frame(Instant::now());
            }
            _ = checkpoints.tick() => {
                surface.sample_checkpoint();
            }
            _ = sleep_until(reconnect_at.unwrap_or_else(|| Instant::now() + IDLE)), if reconnect_at.is_some() => {
                match transport.reconnect().await {
                    Ok(()) => {
                        connected = true;
                        reconnect_at = None;
                        info!(target = "prompter.transport", "reconnected; requesting state");
                        surface.resync();
                    }
                    Err(err) => {
                        reconnect_at = Some(Instant::now() + config.reconnect_delay);
                        warn!(target = "prompter.transport", error = %err, "reconnect failed");
                    }
                }
            }
        }
    }
    debug!(target = "prompter.surface", surface = surface.kind().as_str(), "surface stopped");
}

fn handle_command<V: ScriptView>(
    surface: &mut Surface<V>,
    command: SurfaceCommand,
    transport: &dyn Transport,
) {
    let now = Instant::now();
    match command {
        SurfaceCommand::Control(command, reply) => {
            let _ = reply.send(surface.command(command, now));
        }
        SurfaceCommand::Scroll(offset) => surface.user_scroll(offset, now),
        SurfaceCommand::Resize(height) => surface.resize(height, now),
        SurfaceCommand::Rollback(reply) => {
            let _ = reply.send(surface.rollback(now));
        }
        SurfaceCommand::Search(text, reply) => {
            let _ = reply.send(surface.search(&text, now));
        }
        SurfaceCommand::Status(reply) => {
            let _ = reply.send(SurfaceStatus {
                kind: surface.kind(),
                state: surface.state().clone(),
                scroll_top: surface.view().metrics().scroll_top,
                revision: surface.revision(),
                connected: transport.is_connected(),
                connected_clients: surface.connected_clients(),
                checkpoint: surface.sync().checkpoints.current().cloned(),
                anchors_sent: surface.outbound().anchors_sent(),
                controls_sent: surface.outbound().controls_sent(),
            });
        }
        SurfaceCommand::Shutdown => {}
    }
}

fn log_outcome<V: ScriptView>(surface: &Surface<V>, outcome: &InboundOutcome) {
    let name = surface.kind().as_str();
    match outcome {
        InboundOutcome::State(changes) if !changes.is_empty() => info!(
            target = "prompter.surface",
            surface = name,
            playing = surface.state().is_playing,
            script = ?surface.state().current_script_id,
            revision = ?surface.revision(),
            "state update applied"
        ),
        InboundOutcome::Position(resolution) => info!(
            target = "prompter.surface",
            surface = name,
            path = ?resolution.path,
            node = ?resolution.node,
            scroll = resolution.target,
            "position resolved"
        ),
        InboundOutcome::Miss => debug!(target = "prompter.surface", surface = name, "position missed"),
        _ => trace!(target = "prompter.surface", surface = name, ?outcome, "inbound handled"),
    }
}
