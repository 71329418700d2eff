//! The process-wide 27 MHz clock bus (`OBE_CLOCK`).
//!
//! Every timestamp in the pipeline lives in this domain: 27,000,000 ticks
//! per second, the same rate as an MPEG-TS PCR. 90 kHz PTS/DTS values are
//! always `ticks / 300` (truncating integer division — never round here,
//! every call site in the mux and output layers already rounds where the
//! spec requires it).
//!
//! `ClockBus` decouples wall-clock time from the input's own cadence: the
//! input adapter calls [`ClockBus::tick`] once per delivered picture, and
//! the encoder-output and mux-output smoothers call
//! [`ClockBus::sleep_until`] to pace themselves against that cadence rather
//! than against `SystemTime::now()` directly. This is what lets a burst of
//! frames from a stalled-then-recovered input re-synchronize without the
//! smoothers racing ahead of real time.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Ticks per second of the OBE clock domain.
pub const OBE_CLOCK: i64 = 27_000_000;

/// Convert a 27 MHz tick count to a 90 kHz PTS/DTS value (truncating).
pub fn ticks_to_90khz(ticks: i64) -> i64 {
    ticks / 300
}

/// Convert a 90 kHz PTS/DTS value to 27 MHz ticks.
pub fn from_90khz(pts_90khz: i64) -> i64 {
    pts_90khz * 300
}

struct ClockState {
    /// Last `(input_clock, wall_instant)` pair observed by `tick`, used to
    /// map a future input-clock deadline to a wall-clock sleep duration.
    input_clock: i64,
    anchor_wall: Instant,
    anchor_input: i64,
}

/// Process-wide monotonic input clock.
///
/// There is conceptually one of these per running engine; `obe-engine`
/// owns the instance and threads an `Arc<ClockBus>` to every worker that
/// needs it, rather than reaching for a global singleton (see spec.md §9,
/// "Global `obe_t` context").
pub struct ClockBus {
    state: Mutex<ClockState>,
    cv: Condvar,
    current: AtomicI64,
}

impl Default for ClockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockBus {
    pub fn new() -> Self {
        let now = Instant::now();
        ClockBus {
            state: Mutex::new(ClockState {
                input_clock: 0,
                anchor_wall: now,
                anchor_input: 0,
            }),
            cv: Condvar::new(),
            current: AtomicI64::new(0),
        }
    }

    /// Called by the input adapter on every delivered picture. `pts` is in
    /// `OBE_CLOCK` ticks and must be monotonically non-decreasing.
    pub fn tick(&self, pts: i64) {
        let mut state = self.state.lock();
        state.input_clock = pts;
        state.anchor_wall = Instant::now();
        state.anchor_input = pts;
        self.current.store(pts, Ordering::Release);
        self.cv.notify_all();
    }

    /// Returns the current input clock value.
    pub fn get_input_clock(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }

    /// Blocks until the input clock reaches `deadline`, or returns
    /// immediately if it has already passed. The wall-clock sleep duration
    /// is derived from the input's own cadence (one real second per
    /// `OBE_CLOCK` second, the cadence is assumed 1:1 with wall time once
    /// anchored — a stalled input simply delays the deadline along with
    /// everything downstream of it).
    pub fn sleep_until(&self, deadline: i64) {
        loop {
            let now = self.get_input_clock();
            if now >= deadline {
                return;
            }
            let wall_sleep = Duration::from_secs_f64(
                (deadline - now) as f64 / OBE_CLOCK as f64,
            );
            let mut guard = self.state.lock();
            // Re-check under the lock: a tick() may have advanced the
            // clock between the load above and acquiring the lock.
            if self.get_input_clock() >= deadline {
                return;
            }
            let _ = self.cv.wait_for(&mut guard, wall_sleep);
        }
    }

    /// Wakes every thread blocked in `sleep_until`, used on pipeline
    /// cancellation so smoothers don't outlive the engine.
    pub fn cancel_all_sleepers(&self) {
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninety_khz_round_trip_truncates() {
        assert_eq!(ticks_to_90khz(300), 1);
        assert_eq!(ticks_to_90khz(299), 0);
        assert_eq!(from_90khz(1), 300);
    }

    #[test]
    fn tick_advances_current_clock() {
        let bus = ClockBus::new();
        assert_eq!(bus.get_input_clock(), 0);
        bus.tick(27_000_000);
        assert_eq!(bus.get_input_clock(), 27_000_000);
    }

    #[test]
    fn sleep_until_returns_immediately_for_past_deadline() {
        let bus = ClockBus::new();
        bus.tick(1000);
        bus.sleep_until(500);
    }
}
