pub mod messages;

pub use messages::{ControlAction, ControlCommand, Envelope, Inbound, PositionKind};
