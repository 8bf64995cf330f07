pub mod config;
pub mod console;
pub mod error;
pub mod model;
pub mod playback;
pub mod protocol;
pub mod render;
pub mod script;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod transport;

pub use error::{SyncError, SyncResult};
