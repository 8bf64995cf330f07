use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Debounce state for broadcasting user-initiated scroll positions.
///
/// A burst of scroll events settles into at most one broadcast, and two
/// broadcasts are never closer together than the debounce window.
#[derive(Debug, Clone)]
pub struct PositionBroadcaster {
    debounce: Duration,
    last_scroll: Option<Instant>,
    last_emit: Option<Instant>,
}

impl PositionBroadcaster {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_scroll: None,
            last_emit: None,
        }
    }

    /// Records a scroll observation. Suppressed scrolls (programmatic motion or
    /// playback) also discard any pending settle.
    pub fn note_scroll(&mut self, now: Instant, suppressed: bool) {
        if suppressed {
            if self.last_scroll.take().is_some() {
                trace!(target = "prompter.broadcast", "pending settle discarded by programmatic motion");
            }
            return;
        }
        self.last_scroll = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_scroll.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        let settle = self.last_scroll? + self.debounce;
        Some(match self.last_emit {
            Some(emitted) if emitted + self.debounce > settle => emitted + self.debounce,
            _ => settle,
        })
    }

    /// True exactly once per settle event, when the deadline has passed.
    pub fn take_settled(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.last_scroll = None;
                self.last_emit = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.last_scroll = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(250);

    #[test]
    fn burst_settles_once_after_quiet_period() {
        let start = Instant::now();
        let mut broadcaster = PositionBroadcaster::new(WINDOW);
        for step in 0..10 {
            broadcaster.note_scroll(start + Duration::from_millis(step * 20), false);
        }
        let last = start + Duration::from_millis(180);
        assert!(!broadcaster.take_settled(last + Duration::from_millis(249)));
        assert!(broadcaster.take_settled(last + WINDOW));
        assert!(!broadcaster.take_settled(last + WINDOW * 4));
    }

    #[test]
    fn suppressed_scroll_discards_pending_settle() {
        let start = Instant::now();
        let mut broadcaster = PositionBroadcaster::new(WINDOW);
        broadcaster.note_scroll(start, false);
        broadcaster.note_scroll(start + Duration::from_millis(10), true);
        assert!(!broadcaster.is_pending());
        assert!(!broadcaster.take_settled(start + WINDOW * 2));
    }

    #[test]
    fn emits_are_spaced_by_at_least_one_window() {
        let start = Instant::now();
        let mut broadcaster = PositionBroadcaster::new(WINDOW);
        broadcaster.note_scroll(start, false);
        let first = start + WINDOW;
        assert!(broadcaster.take_settled(first));
        broadcaster.note_scroll(first, false);
        assert_eq!(broadcaster.deadline(), Some(first + WINDOW));
    }
}
