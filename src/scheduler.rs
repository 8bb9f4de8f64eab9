//! Refresh scheduling and time
//!
//! The capture and playback loops are repeating tasks driven by tickers from
//! a [`Scheduler`], and stamp frames with milliseconds from a [`Clock`].
//! Both are injected so hosts and tests control cadence and time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::{Interval, MissedTickBehavior};

/// Default display refresh rate (Hz)
pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Millisecond timestamp source
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`Instant`], starting at zero when created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at zero
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Jump to `ms`
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Produces refresh-cadence tickers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    refresh_hz: u32,
}

impl Scheduler {
    /// Scheduler for a display refreshing at `refresh_hz`
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            refresh_hz: refresh_hz.max(1),
        }
    }

    /// Display refresh rate
    pub fn refresh_hz(&self) -> u32 {
        self.refresh_hz
    }

    /// Ticker firing once per display refresh
    pub fn display_ticker(&self) -> Interval {
        ticker(self.refresh_hz)
    }

    /// Ticker firing at a source's native rate
    ///
    /// Sources never update faster than the display can show, so the rate is
    /// capped at the refresh rate. A rate of zero means "unknown" and follows
    /// the display.
    pub fn source_ticker(&self, frame_rate: u32) -> Interval {
        let hz = match frame_rate {
            0 => self.refresh_hz,
            fps => fps.min(self.refresh_hz),
        };
        ticker(hz)
    }

    /// Period of one display refresh
    pub fn frame_period(&self) -> Duration {
        period(self.refresh_hz)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}

fn period(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / hz.max(1) as u64)
}

fn ticker(hz: u32) -> Interval {
    let mut interval = tokio::time::interval(period(hz));
    // A late cycle is not worth replaying; catch up to the next refresh
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
