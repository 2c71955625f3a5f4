use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// The single repeating timer owned by a [`SessionClock`](super::SessionClock).
///
/// `start` on a running source and `stop` on a stopped one are no-ops, so the
/// clock can never end up with two live timers.
pub trait TickSource: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Virtual tick source: records arm/disarm calls, never fires on its own.
/// Callers advance the clock by calling `SessionClock::tick` directly.
#[derive(Clone, Debug, Default)]
pub struct ManualTicker {
    running: bool,
    starts: usize,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the timer was actually armed.
    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl TickSource for ManualTicker {
    fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.starts += 1;
        }
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Wall-clock tick source backed by one `tokio::time::Interval`.
///
/// Missed ticks are delivered in a burst so a slow executor never drops a
/// second. Stopping discards the interval; restarting schedules the first
/// tick one full period later.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Resolves on the next tick. Pends forever while stopped, which makes it
    /// safe to poll unconditionally inside `tokio::select!`.
    pub async fn wait_tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl TickSource for IntervalTicker {
    fn start(&mut self) {
        if self.interval.is_none() {
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            self.interval = Some(interval);
        }
    }

    fn stop(&mut self) {
        self.interval = None;
    }

    fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}
