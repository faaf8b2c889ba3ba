//! Monotonic deadline clock for the matrix engine
//!
//! A single mutable "interrupt instant" serves both the overall timeout and
//! external cancellation: cancelling simply moves the deadline into the
//! past. The instant is stored as a nanosecond offset from a fixed origin in
//! an atomic word, so a trip from another thread is observed promptly by the
//! submitting thread without locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Deadline based on [`Instant`], insensitive to wall-clock adjustments.
#[derive(Debug)]
pub(crate) struct DeadlineClock {
    origin: Instant,
    deadline_nanos: AtomicU64,
}

impl DeadlineClock {
    /// A fresh, unarmed clock; `expired()` is false until [`arm`](Self::arm)
    /// or [`trip`](Self::trip) is called.
    pub fn new() -> Self {
        DeadlineClock {
            origin: Instant::now(),
            deadline_nanos: AtomicU64::new(u64::MAX),
        }
    }

    fn now_nanos(&self) -> u64 {
        saturating_nanos(self.origin.elapsed())
    }

    /// Set the deadline to now + `timeout`.
    pub fn arm(&self, timeout: Duration) {
        let deadline = self.now_nanos().saturating_add(saturating_nanos(timeout));
        self.deadline_nanos.store(deadline, Ordering::Release);
    }

    /// True iff the deadline lies strictly in the past.
    pub fn expired(&self) -> bool {
        self.now_nanos() > self.deadline_nanos.load(Ordering::Acquire)
    }

    /// Budget left until the deadline, clamped at zero.
    pub fn remaining(&self) -> Duration {
        let deadline = self.deadline_nanos.load(Ordering::Acquire);
        Duration::from_nanos(deadline.saturating_sub(self.now_nanos()))
    }

    /// Move the deadline into the past, unconditionally marking the clock
    /// expired. Safe to call from any thread.
    pub fn trip(&self) {
        let past = self.now_nanos().saturating_sub(1);
        self.deadline_nanos.store(past, Ordering::Release);
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    // u64 nanoseconds cover ~584 years of process uptime
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
