use std::time::Duration;

use crate::model::state::DEFAULT_FONT_SIZE;
use crate::model::{PlaybackState, ViewportMetrics};

/// Longest frame gap honored in one step; a stalled loop resumes smoothly
/// instead of jumping.
const MAX_FRAME_STEP: Duration = Duration::from_millis(250);

/// Per-frame scroll interpolation for playback.
#[derive(Debug, Clone, Copy)]
pub struct Autoplay {
    base_rate: f64,
}

impl Autoplay {
    pub fn new(base_rate: f64) -> Self {
        Self {
            base_rate: base_rate.max(0.0),
        }
    }

    /// Pixels per second for the given state, scaled with font size so reading
    /// pace stays the same when text grows.
    pub fn rate(&self, state: &PlaybackState) -> f64 {
        self.base_rate * state.speed * f64::from(state.font_size) / f64::from(DEFAULT_FONT_SIZE)
    }

    /// Next scroll offset, or `None` when not playing.
    pub fn step(&self, state: &PlaybackState, metrics: &ViewportMetrics, elapsed: Duration) -> Option<f64> {
        if !state.is_playing {
            return None;
        }
        let dt = elapsed.min(MAX_FRAME_STEP).as_secs_f64();
        let delta = self.rate(state) * dt * state.direction.sign();
        Some(metrics.clamp(metrics.scroll_top + delta))
    }
}
