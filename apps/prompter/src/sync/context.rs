use crate::config::SyncConfig;
use crate::sync::{AnchorEncoder, AnchorResolver, CheckpointStore, MotionGuard, PositionBroadcaster};

/// Per-surface synchronization state.
///
/// The motion guard and the rollback checkpoint are owned here rather than held
/// as process globals, so two surfaces in one process never share them.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub config: SyncConfig,
    pub encoder: AnchorEncoder,
    pub resolver: AnchorResolver,
    pub guard: MotionGuard,
    pub broadcaster: PositionBroadcaster,
    pub checkpoints: CheckpointStore,
}

impl SyncContext {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            encoder: AnchorEncoder::new(&config),
            resolver: AnchorResolver::new(&config),
            guard: MotionGuard::new(),
            broadcaster: PositionBroadcaster::new(config.scroll_debounce),
            checkpoints: CheckpointStore::new(&config),
            config,
        }
    }
}
