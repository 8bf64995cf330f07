use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::model::PlaybackState;
use crate::protocol::ControlCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Paused,
    Playing,
}

impl PlaybackPhase {
    pub fn of(state: &PlaybackState) -> Self {
        if state.is_playing {
            PlaybackPhase::Playing
        } else {
            PlaybackPhase::Paused
        }
    }
}

/// Side effects a surface owes its view after a state change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChanges {
    pub started: bool,
    pub stopped: bool,
    pub script_changed: bool,
    pub font_size_changed: bool,
    pub aspect_ratio_changed: bool,
}

impl StateChanges {
    pub fn layout_changed(&self) -> bool {
        self.font_size_changed || self.aspect_ratio_changed
    }

    pub fn is_empty(&self) -> bool {
        *self == StateChanges::default()
    }
}

pub fn diff_states(previous: &PlaybackState, next: &PlaybackState) -> StateChanges {
    StateChanges {
        started: !previous.is_playing && next.is_playing,
        stopped: previous.is_playing && !next.is_playing,
        script_changed: previous.current_script_id != next.current_script_id,
        font_size_changed: previous.font_size != next.font_size,
        aspect_ratio_changed: previous.aspect_ratio != next.aspect_ratio,
    }
}

/// Applies one transition. On error the state is left untouched.
///
/// Loading a different script (or none) pauses playback, so a fresh script
/// never starts scrolling on its own.
pub fn apply_command(state: &mut PlaybackState, command: &ControlCommand) -> SyncResult<StateChanges> {
    let previous = state.clone();
    match command {
        ControlCommand::Play => {
            if !state.has_script() {
                return Err(SyncError::invalid("cannot play without a loaded script"));
            }
            state.is_playing = true;
        }
        ControlCommand::Pause => state.is_playing = false,
        ControlCommand::SetSpeed(speed) => {
            if !speed.is_finite() || *speed <= 0.0 {
                return Err(SyncError::invalid(format!("speed must be positive, got {speed}")));
            }
            state.speed = *speed;
        }
        ControlCommand::SetDirection(direction) => state.direction = *direction,
        ControlCommand::SetFontSize(size) => {
            if *size == 0 {
                return Err(SyncError::invalid("font size must be at least 1"));
            }
            state.font_size = *size;
        }
        ControlCommand::SetAspectRatio(ratio) => state.aspect_ratio = *ratio,
        ControlCommand::SetFlipped(flipped) => state.is_flipped = *flipped,
        ControlCommand::LoadScript(id) => {
            if state.current_script_id != *id {
                state.is_playing = false;
                state.current_script_id = id.clone();
            }
        }
    }
    let changes = diff_states(&previous, state);
    debug!(
        target = "prompter.playback",
        action = ?command.action(),
        phase = ?PlaybackPhase::of(state),
        "applied transition"
    );
    Ok(changes)
}
