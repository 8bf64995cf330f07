use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::anchor::text_fingerprint;
use crate::model::{ConnectedClients, PlaybackState, PositionAnchor, ScriptView, StateSnapshot};
use crate::playback::{Autoplay, StateChanges, apply_command, diff_states};
use crate::protocol::{ControlCommand, Envelope, Inbound, PositionKind};
use crate::script::ScriptProvider;
use crate::session::{Outbound, Role, SurfaceKind};
use crate::sync::{Resolution, SyncContext};

/// What a surface did with one inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    State(StateChanges),
    /// Snapshot older than one already applied.
    Stale,
    Position(Resolution),
    Miss,
    Ignored,
}

/// Anchor captured before a re-layout, resolved once the layout settles.
#[derive(Debug, Clone)]
struct PendingReanchor {
    anchor: Option<PositionAnchor>,
    deadline: Instant,
}

/// One teleprompter surface: its rendering, its playback record, and its
/// sync context. Every operation takes the current instant so the owner
/// (normally [`crate::session::spawn_surface`]) controls time.
pub struct Surface<V: ScriptView> {
    kind: SurfaceKind,
    role: Role,
    view: V,
    state: PlaybackState,
    clients: Option<ConnectedClients>,
    revision: Option<u64>,
    sync: SyncContext,
    autoplay: Autoplay,
    outbound: Outbound,
    scripts: Arc<dyn ScriptProvider>,
    reanchor: Option<PendingReanchor>,
    last_frame: Option<Instant>,
}

impl<V: ScriptView> Surface<V> {
    pub fn new(
        kind: SurfaceKind,
        mut view: V,
        scripts: Arc<dyn ScriptProvider>,
        outbound: Outbound,
        config: SyncConfig,
    ) -> Self {
        let state = PlaybackState::default();
        view.set_font_size(state.font_size);
        view.set_aspect_ratio(state.aspect_ratio);
        Self {
            kind,
            role: kind.role(),
            view,
            state,
            clients: None,
            revision: None,
            autoplay: Autoplay::new(config.base_scroll_rate),
            sync: SyncContext::new(config),
            outbound,
            scripts,
            reanchor: None,
            last_frame: None,
        }
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn sync(&self) -> &SyncContext {
        &self.sync
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn connected_clients(&self) -> Option<ConnectedClients> {
        self.clients
    }

    /// Applies a playback transition locally, then broadcasts it. A failed
    /// send leaves the local change in place.
    pub fn command(&mut self, command: ControlCommand, now: Instant) -> SyncResult<StateChanges> {
        if !self.role.can_send_controls() {
            return Err(SyncError::invalid(format!(
                "{} surface cannot issue {:?}",
                self.kind.as_str(),
                command.action()
            )));
        }
        let changes = apply_command(&mut self.state, &command)?;
        self.apply_changes(changes, now);
        if let Err(err) = self.outbound.send_control(&command) {
            debug!(
                target = "prompter.surface",
                action = ?command.action(),
                error = %err,
                "control not broadcast"
            );
        }
        Ok(changes)
    }

    pub fn play(&mut self, now: Instant) -> SyncResult<StateChanges> {
        self.command(ControlCommand::Play, now)
    }

    pub fn pause(&mut self, now: Instant) -> SyncResult<StateChanges> {
        self.command(ControlCommand::Pause, now)
    }

    pub fn handle_envelope(&mut self, envelope: Envelope, now: Instant) -> InboundOutcome {
        let kind = envelope.kind();
        match Inbound::try_from(envelope) {
            Ok(Inbound::State(snapshot)) => self.apply_snapshot(snapshot, now),
            Ok(Inbound::Position(anchor)) => self.apply_anchor(anchor, now),
            Ok(Inbound::Control(_)) | Ok(Inbound::GetState) => {
                trace!(target = "prompter.surface", kind, "left to the relay");
                InboundOutcome::Ignored
            }
            Err(err) => {
                warn!(target = "prompter.surface", kind, error = %err, "dropping invalid message");
                InboundOutcome::Ignored
            }
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: StateSnapshot, now: Instant) -> InboundOutcome {
        if let (Some(incoming), Some(applied)) = (snapshot.revision, self.revision) {
            if incoming < applied {
                debug!(
                    target = "prompter.surface",
                    incoming, applied, "discarding stale state snapshot"
                );
                return InboundOutcome::Stale;
            }
        }
        if let Some(incoming) = snapshot.revision {
            self.revision = Some(incoming);
        }
        if snapshot.connected_clients.is_some() {
            self.clients = snapshot.connected_clients;
        }
        let next = snapshot.state.normalized();
        let changes = diff_states(&self.state, &next);
        self.state = next;
        self.apply_changes(changes, now);
        InboundOutcome::State(changes)
    }

    /// Resolves an inbound anchor against the local rendering. Rollback anchors
    /// also stop local playback.
    pub fn apply_anchor(&mut self, anchor: PositionAnchor, now: Instant) -> InboundOutcome {
        if anchor.from_rollback && self.state.is_playing {
            let previous = self.state.clone();
            self.state.is_playing = false;
            let changes = diff_states(&previous, &self.state);
            self.apply_changes(changes, now);
            info!(target = "prompter.surface", "paused by rollback");
        }
        match self.jump_to(&anchor, now) {
            Ok(resolution) => InboundOutcome::Position(resolution),
            Err(_) => InboundOutcome::Miss,
        }
    }

    /// A scroll the user made on this surface. Real input ends any jump hold;
    /// only playback keeps suppressing it.
    pub fn user_scroll(&mut self, offset: f64, now: Instant) {
        self.sync.guard.cancel_jump();
        self.view.scroll_to(offset);
        self.observe_scroll(now);
    }

    /// Any scroll observed on the view, whoever caused it.
    pub fn observe_scroll(&mut self, now: Instant) {
        let suppressed = self.state.is_playing || self.sync.guard.is_programmatic_motion(now);
        self.sync.broadcaster.note_scroll(now, suppressed);
    }

    pub fn resize(&mut self, viewport_height: f64, now: Instant) {
        self.begin_relayout(now);
        self.view.resize(viewport_height);
    }

    /// Runs whatever deadline has come due: motion guard expiry, a settled
    /// scroll broadcast, or a pending re-anchor.
    pub fn poll(&mut self, now: Instant) {
        self.sync.guard.expire(now);

        if self.reanchor.as_ref().is_some_and(|pending| now >= pending.deadline) {
            if let Some(anchor) = self.reanchor.take().and_then(|pending| pending.anchor) {
                // Local only; peers keep their own place.
                match self.jump_to(&anchor, now) {
                    Ok(resolution) => trace!(
                        target = "prompter.surface",
                        scroll = resolution.target,
                        "re-anchored after layout change"
                    ),
                    Err(err) => debug!(
                        target = "prompter.surface",
                        error = %err,
                        "re-anchor missed; keeping scroll offset"
                    ),
                }
            }
        }

        if self.sync.broadcaster.take_settled(now) {
            self.broadcast_settled(now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.sync.broadcaster.deadline(),
            self.reanchor.as_ref().map(|pending| pending.deadline),
            self.sync.guard.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// One autoplay frame. Re-checks `is_playing` so a pause takes effect on the
    /// next frame.
    pub fn tick_frame(&mut self, now: Instant) {
        if !self.state.is_playing {
            self.last_frame = None;
            return;
        }
        let elapsed = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);
        if let Some(next) = self.autoplay.step(&self.state, &self.view.metrics(), elapsed) {
            self.view.scroll_to(next);
            self.observe_scroll(now);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn sample_checkpoint(&mut self) -> Option<PositionAnchor> {
        if !self.role.samples_checkpoints() {
            return None;
        }
        let script_id = self.state.current_script_id.clone()?;
        self.sync
            .checkpoints
            .sample(
                &script_id,
                &self.view.metrics(),
                self.view.nodes(),
                self.role.anchor_origin(),
            )
            .cloned()
    }

    /// Jumps back to the rollback checkpoint and broadcasts it. Falls back to
    /// the first dialogue line, then to the beginning of the script.
    pub fn rollback(&mut self, now: Instant) -> SyncResult<Resolution> {
        if !self.role.can_send_positions() {
            return Err(SyncError::invalid("read-only surface cannot roll back"));
        }
        if self.state.is_playing {
            self.pause(now)?;
        }

        let origin = self.role.anchor_origin();
        let anchor = self
            .sync
            .checkpoints
            .current()
            .filter(|_| self.sync.checkpoints.script_id() == self.state.current_script_id.as_deref())
            .cloned()
            .or_else(|| {
                self.sync
                    .checkpoints
                    .first_dialogue_anchor(&self.view.metrics(), self.view.nodes(), origin)
            })
            .unwrap_or_else(|| PositionAnchor::at_beginning(origin).rollback())
            .restamped(origin);

        let (anchor, resolution) = match self.jump_to(&anchor, now) {
            Ok(resolution) => (anchor, resolution),
            Err(_) => {
                let beginning = PositionAnchor::at_beginning(origin).rollback();
                let resolution = self.jump_to(&beginning, now)?;
                (beginning, resolution)
            }
        };
        info!(
            target = "prompter.surface",
            index = ?anchor.index,
            scroll = resolution.target,
            "rolled back"
        );
        self.send_position(PositionKind::Sync, &anchor);
        Ok(resolution)
    }

    /// Jumps to the nearest occurrence of `text` and broadcasts the anchor.
    pub fn search(&mut self, text: &str, now: Instant) -> SyncResult<Resolution> {
        if !self.role.can_send_positions() {
            return Err(SyncError::invalid("read-only surface cannot search"));
        }
        let fingerprint = text_fingerprint(text, self.sync.config.anchor_text_len);
        if fingerprint.is_empty() {
            return Err(SyncError::invalid("search text is empty"));
        }
        let anchor = PositionAnchor::for_text(fingerprint, self.role.anchor_origin());
        let resolution = self.jump_to(&anchor, now)?;
        self.send_position(PositionKind::Search, &anchor);
        Ok(resolution)
    }

    /// Forgets the applied revision and asks for a fresh snapshot. Called
    /// after a reconnect, since a restarted relay numbers from scratch.
    pub fn resync(&mut self) {
        if let Some(applied) = self.revision.take() {
            debug!(target = "prompter.surface", applied, "revision reset for resync");
        }
        self.request_state();
    }

    pub fn request_state(&self) {
        if let Err(err) = self.outbound.request_state() {
            debug!(target = "prompter.surface", error = %err, "state request not sent");
        }
    }

    fn broadcast_settled(&mut self, now: Instant) {
        if self.state.is_playing || self.sync.guard.is_programmatic_motion(now) {
            return;
        }
        match self
            .sync
            .encoder
            .encode_view(&self.view, self.role.anchor_origin())
        {
            Ok(anchor) => self.send_position(PositionKind::Sync, &anchor),
            Err(err) => trace!(target = "prompter.broadcast", error = %err, "nothing to anchor"),
        }
    }

    fn send_position(&self, kind: PositionKind, anchor: &PositionAnchor) {
        if let Err(err) = self.outbound.send_anchor(kind, anchor) {
            debug!(target = "prompter.broadcast", error = %err, "position not broadcast");
        }
    }

    /// Programmatic jump: holds the motion guard so the resulting scroll is not
    /// mistaken for the user's.
    fn jump_to(&mut self, anchor: &PositionAnchor, now: Instant) -> SyncResult<Resolution> {
        self.sync.guard.engage_jump(now, self.sync.config.jump_settle);
        self.sync.broadcaster.cancel();
        let resolution = self.sync.resolver.resolve(anchor, &mut self.view)?;
        trace!(
            target = "prompter.surface",
            path = ?resolution.path,
            scroll = resolution.target,
            "resolved anchor"
        );
        Ok(resolution)
    }

    fn begin_relayout(&mut self, now: Instant) {
        let deadline = now + self.sync.config.resize_debounce;
        match self.reanchor.as_mut() {
            Some(pending) => pending.deadline = deadline,
            None => {
                let anchor = self
                    .sync
                    .encoder
                    .encode_view(&self.view, self.role.anchor_origin())
                    .ok();
                self.reanchor = Some(PendingReanchor { anchor, deadline });
            }
        }
    }

    fn apply_changes(&mut self, changes: StateChanges, now: Instant) {
        if changes.is_empty() {
            return;
        }
        if changes.script_changed {
            self.reanchor = None;
            self.sync.broadcaster.cancel();
            self.sync
                .checkpoints
                .on_script_changed(self.state.current_script_id.as_deref());
        } else if changes.layout_changed() {
            self.begin_relayout(now);
        }
        if changes.font_size_changed {
            self.view.set_font_size(self.state.font_size);
        }
        if changes.aspect_ratio_changed {
            self.view.set_aspect_ratio(self.state.aspect_ratio);
        }
        if changes.script_changed {
            self.load_current_script();
        }

        if changes.started {
            self.sync.guard.engage_autoplay();
            self.sync.broadcaster.cancel();
            self.last_frame = Some(now);
            self.sample_checkpoint();
        }
        if changes.stopped {
            self.sync.guard.release_autoplay();
            self.last_frame = None;
        }
        debug!(
            target = "prompter.surface",
            surface = self.kind.as_str(),
            playing = self.state.is_playing,
            script = ?self.state.current_script_id,
            font_size = self.state.font_size,
            "state applied"
        );
    }

    fn load_current_script(&mut self) {
        let script = match self.state.current_script_id.as_deref() {
            Some(id) => {
                let script = self.scripts.script_by_id(id);
                if script.is_none() {
                    warn!(target = "prompter.surface", script_id = id, "script not found");
                }
                script
            }
            None => None,
        };
        self.view.load_script(script.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedScript;
    use crate::script::{InMemoryScripts, Script};
    use crate::sync::ResolutionPath;
    use crate::transport::{BusTransport, Transport};
    use prompter_bus::LocalHub;
    use std::time::Duration;

    const SCRIPT: &str = "INT. STUDIO - NIGHT\n\nANNA\nGood evening.\n\nBEN\nWelcome back.\n\nANNA\nLet's begin.\n\nBEN\nStand by.\n";

    fn surface(kind: SurfaceKind) -> Surface<RenderedScript> {
        let hub = LocalHub::new();
        let transport: Arc<dyn Transport> = Arc::new(BusTransport::new(Arc::new(hub.attach()), "studio"));
        let scripts = Arc::new(InMemoryScripts::new().with(Script::new("pilot", SCRIPT)));
        Surface::new(
            kind,
            RenderedScript::new(400.0),
            scripts,
            Outbound::for_role(kind.role(), transport),
            SyncConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn loading_a_script_renders_it() {
        let mut admin = surface(SurfaceKind::Admin);
        let now = Instant::now();
        admin
            .command(ControlCommand::LoadScript(Some("pilot".into())), now)
            .expect("load");
        assert_eq!(crate::model::dialogue_positions(admin.view().nodes()).len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn viewer_cannot_issue_commands() {
        let mut viewer = surface(SurfaceKind::Viewer);
        let now = Instant::now();
        let result = viewer.command(ControlCommand::SetFlipped(true), now);
        assert!(matches!(result, Err(SyncError::InvalidOperation(_))));
        assert!(!viewer.state().is_flipped);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_snapshots_are_discarded() {
        let mut viewer = surface(SurfaceKind::Viewer);
        let now = Instant::now();
        let newer = PlaybackState {
            speed: 3.0,
            ..PlaybackState::default()
        };
        let older = PlaybackState {
            speed: 1.5,
            ..PlaybackState::default()
        };
        viewer.apply_snapshot(StateSnapshot::new(newer).with_revision(7), now);
        let outcome = viewer.apply_snapshot(StateSnapshot::new(older.clone()).with_revision(6), now);
        assert_eq!(outcome, InboundOutcome::Stale);
        assert_eq!(viewer.state().speed, 3.0);

        viewer.apply_snapshot(StateSnapshot::new(older), now);
        assert_eq!(viewer.state().speed, 1.5);
        assert_eq!(viewer.revision(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn resync_accepts_a_restarted_relay_numbering() {
        let mut viewer = surface(SurfaceKind::Viewer);
        let now = Instant::now();
        viewer.apply_snapshot(StateSnapshot::new(PlaybackState::default()).with_revision(40), now);

        let restarted = PlaybackState {
            speed: 2.0,
            ..PlaybackState::default()
        };
        let outcome = viewer.apply_snapshot(StateSnapshot::new(restarted.clone()).with_revision(1), now);
        assert_eq!(outcome, InboundOutcome::Stale);

        viewer.resync();
        assert_eq!(viewer.revision(), None);
        let outcome = viewer.apply_snapshot(StateSnapshot::new(restarted).with_revision(1), now);
        assert!(matches!(outcome, InboundOutcome::State(_)));
        assert_eq!(viewer.state().speed, 2.0);
        assert_eq!(viewer.revision(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_rollback_anchor_pauses_playback() {
        let mut viewer = surface(SurfaceKind::Viewer);
        let now = Instant::now();
        let playing = PlaybackState {
            is_playing: true,
            current_script_id: Some("pilot".into()),
            ..PlaybackState::default()
        };
        viewer.apply_snapshot(StateSnapshot::new(playing), now);
        assert!(viewer.is_playing());
        assert!(viewer.sync().guard.autoplay_engaged());

        let anchor = PositionAnchor::for_text("Let's begin.", crate::model::AnchorOrigin::Admin)
            .with_index(2, 4)
            .rollback();
        let outcome = viewer.apply_anchor(anchor, now);
        assert!(!viewer.is_playing());
        assert!(!viewer.sync().guard.autoplay_engaged());
        let InboundOutcome::Position(resolution) = outcome else {
            panic!("expected a resolution, got {outcome:?}");
        };
        assert_eq!(resolution.path, ResolutionPath::Index);
    }

    #[tokio::test(start_paused = true)]
    async fn layout_change_reanchors_after_the_debounce() {
        let mut admin = surface(SurfaceKind::Admin);
        let start = Instant::now();
        admin
            .command(ControlCommand::LoadScript(Some("pilot".into())), start)
            .expect("load");
        let dialogue = crate::model::dialogue_positions(admin.view().nodes());
        let third = dialogue[2];
        let target = admin.sync().resolver.target_for(&admin.view().nodes()[third], &admin.view().metrics());
        admin.user_scroll(target, start);

        admin
            .command(ControlCommand::SetFontSize(48), start)
            .expect("font size");
        assert_eq!(admin.view().font_size(), 48);
        let settle = start + admin.sync().config.resize_debounce;
        assert_eq!(admin.next_deadline(), Some(settle));
        admin.poll(settle);

        let nodes = admin.view().nodes();
        let metrics = admin.view().metrics();
        let dialogue = crate::model::dialogue_positions(nodes);
        let expected = admin.sync().resolver.target_for(&nodes[dialogue[2]], &metrics);
        assert_ne!(expected, target);
        assert_eq!(metrics.scroll_top, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_frames_advance_the_view() {
        let mut admin = surface(SurfaceKind::Admin);
        let start = Instant::now();
        admin
            .command(ControlCommand::LoadScript(Some("pilot".into())), start)
            .expect("load");
        admin.play(start).expect("play");
        admin.tick_frame(start + Duration::from_millis(100));
        assert!(admin.view().metrics().scroll_top > 0.0);
        admin.pause(start + Duration::from_millis(100)).expect("pause");
        let parked = admin.view().metrics().scroll_top;
        admin.tick_frame(start + Duration::from_millis(200));
        assert_eq!(admin.view().metrics().scroll_top, parked);
    }
}
