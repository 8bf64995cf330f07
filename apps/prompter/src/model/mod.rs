pub mod anchor;
pub mod content;
pub mod state;

pub use anchor::{AnchorOrigin, PositionAnchor};
pub use content::{ContentNode, NodeKind, ScriptView, ViewportMetrics, dialogue_positions};
pub use state::{AspectRatio, ConnectedClients, Direction, PlaybackState, StateSnapshot};
