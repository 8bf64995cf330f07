//! Transport envelopes shared with the web surfaces and the relay server.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::model::{AspectRatio, Direction, PositionAnchor, StateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlAction {
    Play,
    Pause,
    SetSpeed,
    SetDirection,
    SetFontSize,
    SetAspectRatio,
    SetFlipped,
    LoadScript,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    Control {
        action: ControlAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    StateUpdate {
        data: StateSnapshot,
    },
    SearchPosition {
        data: PositionAnchor,
    },
    SyncPosition {
        data: PositionAnchor,
    },
    GetState,
}

impl Envelope {
    pub fn control(command: &ControlCommand) -> Self {
        Envelope::Control {
            action: command.action(),
            value: command.value(),
        }
    }

    pub fn state(snapshot: StateSnapshot) -> Self {
        Envelope::StateUpdate { data: snapshot }
    }

    pub fn position(kind: PositionKind, anchor: PositionAnchor) -> Self {
        match kind {
            PositionKind::Search => Envelope::SearchPosition { data: anchor },
            PositionKind::Sync => Envelope::SyncPosition { data: anchor },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Control { .. } => "CONTROL",
            Envelope::StateUpdate { .. } => "STATE_UPDATE",
            Envelope::SearchPosition { .. } => "SEARCH_POSITION",
            Envelope::SyncPosition { .. } => "SYNC_POSITION",
            Envelope::GetState => "GET_STATE",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Which wire tag a position anchor travels under. Both decode to the same
/// [`Inbound::Position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Search,
    Sync,
}

/// A validated playback transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Play,
    Pause,
    SetSpeed(f64),
    SetDirection(Direction),
    SetFontSize(u32),
    SetAspectRatio(AspectRatio),
    SetFlipped(bool),
    LoadScript(Option<String>),
}

impl ControlCommand {
    pub fn action(&self) -> ControlAction {
        match self {
            ControlCommand::Play => ControlAction::Play,
            ControlCommand::Pause => ControlAction::Pause,
            ControlCommand::SetSpeed(_) => ControlAction::SetSpeed,
            ControlCommand::SetDirection(_) => ControlAction::SetDirection,
            ControlCommand::SetFontSize(_) => ControlAction::SetFontSize,
            ControlCommand::SetAspectRatio(_) => ControlAction::SetAspectRatio,
            ControlCommand::SetFlipped(_) => ControlAction::SetFlipped,
            ControlCommand::LoadScript(_) => ControlAction::LoadScript,
        }
    }

    pub fn value(&self) -> Option<Value> {
        match self {
            ControlCommand::Play | ControlCommand::Pause => None,
            ControlCommand::SetSpeed(speed) => Some(Value::from(*speed)),
            ControlCommand::SetDirection(direction) => Some(Value::from(direction.as_str())),
            ControlCommand::SetFontSize(size) => Some(Value::from(*size)),
            ControlCommand::SetAspectRatio(ratio) => Some(Value::from(ratio.as_str())),
            ControlCommand::SetFlipped(flipped) => Some(Value::from(*flipped)),
            ControlCommand::LoadScript(id) => Some(id.clone().map(Value::from).unwrap_or(Value::Null)),
        }
    }

    pub fn from_wire(action: ControlAction, value: Option<&Value>) -> SyncResult<Self> {
        let value = value.filter(|value| !value.is_null());
        let command = match action {
            ControlAction::Play => ControlCommand::Play,
            ControlAction::Pause => ControlCommand::Pause,
            ControlAction::SetSpeed => {
                let speed = value
                    .and_then(Value::as_f64)
                    .ok_or_else(|| bad_value(action, "a number"))?;
                ControlCommand::SetSpeed(speed)
            }
            ControlAction::SetDirection => {
                let direction = value
                    .and_then(|value| serde_json::from_value(value.clone()).ok())
                    .ok_or_else(|| bad_value(action, "\"forward\" or \"backward\""))?;
                ControlCommand::SetDirection(direction)
            }
            ControlAction::SetFontSize => {
                let size = value
                    .and_then(as_whole_number)
                    .and_then(|size| u32::try_from(size).ok())
                    .ok_or_else(|| bad_value(action, "a positive integer"))?;
                ControlCommand::SetFontSize(size)
            }
            ControlAction::SetAspectRatio => {
                let ratio = value
                    .and_then(|value| serde_json::from_value(value.clone()).ok())
                    .ok_or_else(|| bad_value(action, "\"16:9\" or \"4:3\""))?;
                ControlCommand::SetAspectRatio(ratio)
            }
            ControlAction::SetFlipped => {
                let flipped = value
                    .and_then(Value::as_bool)
                    .ok_or_else(|| bad_value(action, "a boolean"))?;
                ControlCommand::SetFlipped(flipped)
            }
            ControlAction::LoadScript => match value {
                None => ControlCommand::LoadScript(None),
                Some(Value::String(id)) => ControlCommand::LoadScript(Some(id.clone())),
                Some(_) => return Err(bad_value(action, "a script id or null")),
            },
        };
        Ok(command)
    }
}

fn as_whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64)
    })
}

fn bad_value(action: ControlAction, expected: &str) -> SyncError {
    SyncError::invalid(format!("{action:?} expects {expected}"))
}

/// Decoded, validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlCommand),
    State(StateSnapshot),
    Position(PositionAnchor),
    GetState,
}

impl TryFrom<Envelope> for Inbound {
    type Error = SyncError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match envelope {
            Envelope::Control { action, value } => {
                ControlCommand::from_wire(action, value.as_ref()).map(Inbound::Control)
            }
            Envelope::StateUpdate { data } => Ok(Inbound::State(data)),
            Envelope::SearchPosition { data } | Envelope::SyncPosition { data } => {
                data.validate()?;
                Ok(Inbound::Position(data))
            }
            Envelope::GetState => Ok(Inbound::GetState),
        }
    }
}
