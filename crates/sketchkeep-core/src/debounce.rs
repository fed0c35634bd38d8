//! Trailing-edge debounce timer.
//!
//! The timer never fires on its own. The host event loop asks it whether the
//! quiescence window has elapsed (`take_due`), which keeps the timer usable
//! both under a browser `setTimeout` and a native frame loop.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The platform monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to the code under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    /// Time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }
}

/// At most one pending deadline; every `schedule` pushes it back.
#[derive(Debug)]
pub struct DebounceTimer<C: Clock> {
    clock: C,
    window: Duration,
    deadline: Option<Instant>,
}

impl<C: Clock> DebounceTimer<C> {
    pub fn new(window: Duration, clock: C) -> Self {
        Self {
            clock,
            window,
            deadline: None,
        }
    }

    /// The quiescence window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arm the timer, or re-arm it if already pending.
    pub fn schedule(&mut self) {
        self.deadline = Some(self.clock.now() + self.window);
    }

    /// Disarm the timer. Returns whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending run becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending run becomes due.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    /// Disarm and return `true` if the window has elapsed.
    pub fn take_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Disarm and return `true` if anything was pending, due or not.
    pub fn flush_if_pending(&mut self) -> bool {
        self.cancel()
    }
}
