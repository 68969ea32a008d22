//! Monotonic time used for every deadline comparison.
//!
//! Deadlines are never derived from wall-clock time: a [`Timestamp`] is the
//! number of milliseconds elapsed on a monotonic timeline, so clock skew or
//! NTP jumps cannot trigger a premature or late refund.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Milliseconds on a monotonic timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, d: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(d)))
    }

    /// Time from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Source of monotonic time shared by the coordinator, the state machines
/// and (for simulated ledgers) the ledgers themselves.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Real monotonic clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
    offset: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: 0,
        }
    }

    /// Continue a timeline from a persisted checkpoint.
    ///
    /// Time that passed while the process was down is not counted.
    pub fn resume_from(checkpoint: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            offset: checkpoint.0,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.offset.saturating_add(duration_millis(self.origin.elapsed())))
    }
}

/// Clock that only moves when told to. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ts: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(ts.0),
        }
    }

    pub fn advance(&self, d: Duration) -> Timestamp {
        let ms = duration_millis(d);
        Timestamp(self.now.fetch_add(ms, Ordering::SeqCst).saturating_add(ms))
    }

    /// Jump to `ts`. Moving backwards is ignored.
    pub fn set(&self, ts: Timestamp) {
        self.now.fetch_max(ts.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}
