// Debounced auto-save scheduling.
//
// A single pending slot: every mutation pushes the deadline out again
// (last write wins), and the owner polls `take_due` from its event loop.
// Nothing here performs I/O; the controller decides where the save goes
// at the moment it fires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Time source for the debouncer.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests and replays.
/// Clones share the same offset.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Single-slot debounce timer.
#[derive(Debug, Clone)]
pub struct AutoSave {
    debounce: Duration,
    deadline: Option<Instant>,
    /// Bumped on every schedule so a caller holding an old generation can
    /// tell it was superseded.
    generation: u64,
}

impl AutoSave {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            generation: 0,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Cancel any pending save and schedule a new one `debounce` from `now`.
    pub fn schedule(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + self.debounce);
        self.generation
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.is_pending() && self.generation == generation
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Clear the slot if the deadline has passed. Returns true when the
    /// caller should save now.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }

    /// Clear the slot regardless of the deadline (flush on exit).
    pub fn take_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
