//! Frame clocks.
//!
//! The run loop never reads the wall clock directly. It asks a [`FrameClock`]
//! how much time passed since the previous frame, which lets tests and the
//! headless runner drive frames with exact, scripted deltas.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic source of frame deltas.
pub trait FrameClock {
    /// Time since the previous call (or since construction), restarting the
    /// measurement.
    fn elapsed_and_restart(&mut self) -> Duration;

    /// Block for `duration`. The only blocking call the run loop makes.
    fn sleep(&mut self, duration: Duration);

    /// Milliseconds since the clock was created. Used for autosave timing.
    fn now_ms(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// The real clock.
#[derive(Debug, Clone)]
pub struct Timer {
    origin: Instant,
    last: Instant,
}

impl Timer {
    /// A timer starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            origin: now,
            last: now,
        }
    }

    /// Time since the last restart, without restarting.
    pub fn elapsed(&self) -> Duration {
        self.last.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock for Timer {
    fn elapsed_and_restart(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        elapsed
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    pending: Duration,
    sleeps: Vec<Duration>,
}

/// A scripted clock. Time only moves when [`advance`](Self::advance) or
/// [`FrameClock::sleep`] is called.
///
/// Clones share the same timeline, so a test can keep a handle while the
/// context owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Rc<RefCell<ManualClockState>>,
}

impl ManualClock {
    /// A clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut inner = self.inner.borrow_mut();
        inner.now += delta;
        inner.pending += delta;
    }

    /// Every sleep requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.borrow().sleeps.clone()
    }
}

impl FrameClock for ManualClock {
    fn elapsed_and_restart(&mut self) -> Duration {
        std::mem::take(&mut self.inner.borrow_mut().pending)
    }

    /// Records the sleep and lets that much time pass.
    fn sleep(&mut self, duration: Duration) {
        let mut inner = self.inner.borrow_mut();
        inner.sleeps.push(duration);
        inner.now += duration;
        inner.pending += duration;
    }

    fn now_ms(&self) -> u64 {
        self.inner.borrow().now.as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_reports_and_resets_pending() {
        let handle = ManualClock::new();
        let mut clock = handle.clone();
        handle.advance(Duration::from_millis(30));
        assert_eq!(clock.elapsed_and_restart(), Duration::from_millis(30));
        assert_eq!(clock.elapsed_and_restart(), Duration::ZERO);
        assert_eq!(clock.now_ms(), 30);
    }

    #[test]
    fn manual_sleep_passes_time() {
        let mut clock = ManualClock::new();
        clock.sleep(Duration::from_millis(5));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(5)]);
        assert_eq!(clock.elapsed_and_restart(), Duration::from_millis(5));
        assert_eq!(clock.now_ms(), 5);
    }

    #[test]
    fn real_timer_is_monotonic() {
        let mut timer = Timer::new();
        let a = timer.elapsed_and_restart();
        let b = timer.elapsed_and_restart();
        assert!(a < Duration::from_secs(1));
        assert!(b < Duration::from_secs(1));
    }
}
