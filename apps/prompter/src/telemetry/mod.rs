//! Opt-in timing and event counters for the sync hot paths.
//!
//! Everything here is a no-op unless `PROMPTER_PERF` is set to a non-empty,
//! non-`0` value. Counters are process-wide and keyed by static labels such
//! as `resolver.resolve` or `outbound.anchor.sent`.
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub mod logging;

const REPORT_EVERY: u64 = 200;

static PERF_ENABLED: Lazy<bool> = Lazy::new(|| {
    std::env::var("PROMPTER_PERF")
        .map(|value| !value.is_empty() && value != "0")
        .unwrap_or(false)
});

static COUNTERS: Lazy<Mutex<BTreeMap<&'static str, Counter>>> =
    Lazy::new(|| Mutex::new(BTreeMap::new()));

#[derive(Default)]
struct Counter {
    count: u64,
    timed: u64,
    total: Duration,
    max: Duration,
}

impl Counter {
    fn mean(&self) -> Duration {
        if self.timed == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.timed);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    fn snapshot(&self, label: &'static str) -> PerfSnapshot {
        PerfSnapshot {
            label,
            count: self.count,
            mean: self.mean(),
            max: self.max,
        }
    }
}

/// Point-in-time view of one counter. `mean` and `max` are zero for pure
/// event counters.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfSnapshot {
    pub label: &'static str,
    pub count: u64,
    pub mean: Duration,
    pub max: Duration,
}

pub fn enabled() -> bool {
    *PERF_ENABLED
}

pub fn record_duration(label: &'static str, elapsed: Duration) {
    if enabled() {
        bump(label, Some(elapsed));
    }
}

/// Counts discrete events (broadcasts sent, sends suppressed by role).
pub fn record_count(label: &'static str) {
    if enabled() {
        bump(label, None);
    }
}

fn bump(label: &'static str, elapsed: Option<Duration>) {
    let mut counters = COUNTERS.lock();
    let counter = counters.entry(label).or_default();
    counter.count += 1;
    if let Some(elapsed) = elapsed {
        counter.timed += 1;
        counter.total += elapsed;
        counter.max = counter.max.max(elapsed);
    }
    if counter.count % REPORT_EVERY == 0 {
        let snapshot = counter.snapshot(label);
        debug!(
            target = "prompter.perf",
            label,
            count = snapshot.count,
            mean_us = snapshot.mean.as_micros() as u64,
            max_us = snapshot.max.as_micros() as u64,
            "perf sample"
        );
    }
}

/// All counters recorded so far, ordered by label.
pub fn snapshot() -> Vec<PerfSnapshot> {
    COUNTERS
        .lock()
        .iter()
        .map(|(label, counter)| counter.snapshot(*label))
        .collect()
}

/// Logs one line per counter; called once on shutdown.
pub fn log_summary() {
    if !enabled() {
        return;
    }
    for entry in snapshot() {
        info!(
            target = "prompter.perf",
            label = entry.label,
            count = entry.count,
            mean_us = entry.mean.as_micros() as u64,
            max_us = entry.max.as_micros() as u64,
            "perf summary"
        );
    }
}

/// Times a scope when perf counters are enabled.
pub struct PerfGuard {
    label: &'static str,
    started: Instant,
}

impl PerfGuard {
    pub fn new(label: &'static str) -> Option<Self> {
        enabled().then(|| Self {
            label,
            started: Instant::now(),
        })
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        record_duration(self.label, self.started.elapsed());
    }
}
