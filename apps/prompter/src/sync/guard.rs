use std::time::Duration;

use tokio::time::Instant;

/// Motion suppression guard: engaged while the surface itself is moving the view.
///
/// Autoplay holds it for as long as playback runs. A resolver-driven jump holds it
/// until the jump settles. Scroll observed while engaged is never broadcast.
#[derive(Debug, Clone, Default)]
pub struct MotionGuard {
    autoplay: bool,
    jump_until: Option<Instant>,
}

impl MotionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage_autoplay(&mut self) {
        self.autoplay = true;
    }

    pub fn release_autoplay(&mut self) {
        self.autoplay = false;
    }

    pub fn autoplay_engaged(&self) -> bool {
        self.autoplay
    }

    pub fn engage_jump(&mut self, now: Instant, settle: Duration) {
        let until = now + settle;
        self.jump_until = Some(match self.jump_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    pub fn cancel_jump(&mut self) {
        self.jump_until = None;
    }

    pub fn is_programmatic_motion(&self, now: Instant) -> bool {
        self.autoplay || self.jump_until.is_some_and(|until| now < until)
    }

    /// Drops a jump hold whose settle time has passed.
    pub fn expire(&mut self, now: Instant) {
        if self.jump_until.is_some_and(|until| now >= until) {
            self.jump_until = None;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.jump_until
    }
}
