pub mod outbound;
pub mod relay;
pub mod role;
pub mod runtime;
pub mod surface;

pub use outbound::{AnchorSender, ControlSender, NoopAnchorSender, NoopControlSender, Outbound};
pub use relay::{StateRelay, spawn_relay};
pub use role::{Role, SurfaceKind};
pub use runtime::{SurfaceCommand, SurfaceHandle, SurfaceStatus, spawn_surface};
pub use surface::{InboundOutcome, Surface};
