//! Fixed-interval timer for `select!` loops.
//!
//! A [`Ticker`] is stopped until [`Ticker::start`] is called. While stopped,
//! [`Ticker::wait_for_tick`] pends forever, so a stopped ticker can sit in a
//! `tokio::select!` next to other branches without ever firing:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* handle event */ }
//!         info = ticker.wait_for_tick() => { /* periodic work */ }
//!     }
//! }
//! ```
//!
//! Stopping a ticker is the cancellation: nothing is spawned, so there is
//! no task that could outlive its owner.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Information about a fired tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1, survives restarts).
    pub tick: u64,
    /// `true` if the tick fired noticeably late.
    pub overrun: bool,
    /// Whole periods skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// A restartable fixed-interval timer.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next_tick: Option<Instant>,
    tick_count: u64,
}

impl Ticker {
    /// Creates a stopped ticker. A zero period is treated as one
    /// millisecond.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            next_tick: None,
            tick_count: 0,
        }
    }

    /// Starts (or restarts) the ticker. The first tick fires one period
    /// from now.
    pub fn start(&mut self) {
        self.next_tick = Some(Instant::now() + self.period);
        debug!(period_ms = saturating_millis(self.period), "ticker started");
    }

    /// Stops the ticker. Idempotent.
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(tick = self.tick_count, "ticker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Waits until the next tick is due. Pends forever while stopped.
    ///
    /// Late ticks are not replayed: the next one is scheduled a full period
    /// after the late one fired.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > self.period / 10;
        let ticks_skipped = if overrun {
            periods_in(late_by, self.period)
        } else {
            0
        };
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = saturating_millis(late_by),
                "ticker overrun, skipping ahead"
            );
        }
        self.next_tick = Some(now + self.period);

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }
}

/// Whole `period`s contained in `late_by`, saturating at `u64::MAX`.
fn periods_in(late_by: Duration, period: Duration) -> u64 {
    u64::try_from(late_by.as_nanos() / period.as_nanos().max(1)).unwrap_or(u64::MAX)
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
