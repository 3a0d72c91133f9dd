//! Monotonic time source.
//!
//! Everything in the orchestrator that measures a duration (the reconnect
//! window, the autohost throttle, the graceful-shutdown grace period) does
//! so in milliseconds since an arbitrary epoch fixed at process start. Wall
//! clock time is never consulted on the hot path; it only shows up in log
//! timestamps, which `tracing-subscriber` attaches on its own.

use std::time::Instant;

/// A cheap, `Copy` monotonic clock. `Instant::now()` on every platform
/// Rust supports is already backed by a monotonic source (`CLOCK_MONOTONIC`
/// on Unix, `QueryPerformanceCounter` on Windows), so unlike the original
/// bot there is no `numer/denom` conversion to get wrong.
#[derive(Clone, Copy)]
pub struct Clock {
    started_at: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Milliseconds elapsed since this clock was created. Wraps only after
    /// running for more than `u32::MAX` milliseconds (~49.7 days), matching
    /// the original bot's tick counter width.
    pub fn now_ms(&self) -> u32 {
        self.started_at.elapsed().as_millis() as u32
    }

    pub fn now_s(&self) -> u32 {
        self.now_ms() / 1000
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
