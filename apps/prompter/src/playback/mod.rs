pub mod autoplay;
pub mod machine;

pub use autoplay::Autoplay;
pub use machine::{PlaybackPhase, StateChanges, apply_command, diff_states};
