pub mod broadcaster;
pub mod checkpoint;
pub mod context;
pub mod encoder;
pub mod guard;
pub mod resolver;

pub use broadcaster::PositionBroadcaster;
pub use checkpoint::CheckpointStore;
pub use context::SyncContext;
pub use encoder::AnchorEncoder;
pub use guard::MotionGuard;
pub use resolver::{AnchorResolver, Resolution, ResolutionPath};
