use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT_SIZE: u32 = 32;
pub const DEFAULT_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
}

impl AspectRatio {
    pub fn width_over_height(self) -> f64 {
        match self {
            AspectRatio::Widescreen => 16.0 / 9.0,
            AspectRatio::Standard => 4.0 / 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Standard => "4:3",
        }
    }
}

/// Shared playback record, one live copy per surface.
///
/// Kept eventually consistent by `STATE_UPDATE` snapshots. A surface mutates its
/// copy optimistically before broadcasting the matching control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub speed: f64,
    pub direction: Direction,
    pub font_size: u32,
    pub aspect_ratio: AspectRatio,
    pub is_flipped: bool,
    pub current_script_id: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            speed: DEFAULT_SPEED,
            direction: Direction::Forward,
            font_size: DEFAULT_FONT_SIZE,
            aspect_ratio: AspectRatio::Widescreen,
            is_flipped: false,
            current_script_id: None,
        }
    }
}

impl PlaybackState {
    pub fn has_script(&self) -> bool {
        self.current_script_id.is_some()
    }

    /// Enforces `current_script_id == None => !is_playing` and repairs values a
    /// peer could have sent out of range.
    pub fn normalized(mut self) -> Self {
        if self.current_script_id.is_none() {
            self.is_playing = false;
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            self.speed = DEFAULT_SPEED;
        }
        if self.font_size == 0 {
            self.font_size = DEFAULT_FONT_SIZE;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedClients {
    #[serde(default)]
    pub admin: u32,
    #[serde(default)]
    pub viewer: u32,
    #[serde(default)]
    pub remote: u32,
}

/// Payload of `STATE_UPDATE`: an authoritative snapshot, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(flatten)]
    pub state: PlaybackState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_clients: Option<ConnectedClients>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl StateSnapshot {
    pub fn new(state: PlaybackState) -> Self {
        Self {
            state,
            connected_clients: None,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }
}
