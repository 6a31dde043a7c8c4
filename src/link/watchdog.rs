//! # Link Watchdog
//!
//! Detects a device that is still connected but has stopped sending samples.
//!
//! The ticker runs as its own tokio task but owns no link state: each period it
//! only posts a tick message carrying its generation. The link feeds ticks back
//! through [`LinkWatchdog::on_tick`], so the "sample seen" flag is only ever
//! touched by the link's event loop. Ticks from a timer that has since been
//! disarmed carry an old generation and are ignored.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

/// What a tick means for the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from a disarmed or replaced timer
    Stale,
    /// Samples arrived during the last period
    Healthy,
    /// A whole period passed without a sample
    Expired,
}

/// Sample-arrival watchdog
#[derive(Debug, Default)]
pub struct LinkWatchdog {
    ticker: Option<JoinHandle<()>>,
    generation: u64,
    period_ms: u64,
    sample_seen: bool,
}

impl LinkWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `period_ms`, calling `on_tick` with this timer's generation
    ///
    /// A period of 0 disables the watchdog and nothing is started. The ticker
    /// stops once `on_tick` returns false. Must be called inside a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `bool` - true if a timer was started
    ///
    /// # Panics
    ///
    /// Panics if a timer is already running. The owner must disarm before re-arming.
    pub fn arm<F>(&mut self, period_ms: u64, on_tick: F) -> bool
    where
        F: Fn(u64) -> bool + Send + 'static,
    {
        if period_ms == 0 {
            return false;
        }

        assert!(
            self.ticker.is_none(),
            "Cannot start sample watchdog while one is already running"
        );

        self.generation += 1;
        self.period_ms = period_ms;
        // The first period is a grace period
        self.sample_seen = true;

        let generation = self.generation;
        let period = Duration::from_millis(period_ms);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                if !on_tick(generation) {
                    return;
                }
            }
        }));

        debug!("Sample watchdog armed: {} ms (generation {})", period_ms, generation);
        true
    }

    /// Stop the timer. Safe to call when not armed.
    pub fn disarm(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            self.generation += 1;
            debug!("Sample watchdog disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Record that a valid sample arrived
    pub fn note_sample(&mut self) {
        self.sample_seen = true;
    }

    /// Evaluate a tick from the timer of `generation`
    pub fn on_tick(&mut self, generation: u64) -> TickOutcome {
        if self.ticker.is_none() || generation != self.generation {
            return TickOutcome::Stale;
        }

        if !self.sample_seen {
            return TickOutcome::Expired;
        }

        self.sample_seen = false;
        TickOutcome::Healthy
    }
}

impl Drop for LinkWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn channel_ticker() -> (impl Fn(u64) -> bool + Send + 'static, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (move |generation| tx.send(generation).is_ok(), rx)
    }

    #[test]
    fn test_zero_period_disables() {
        let mut watchdog = LinkWatchdog::new();
        assert!(!watchdog.arm(0, |_| true));
        assert!(!watchdog.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let mut watchdog = LinkWatchdog::new();
        let (on_tick, mut rx) = channel_ticker();
        assert!(watchdog.arm(1000, on_tick));

        let start = Instant::now();
        let generation = rx.recv().await.unwrap();
        let first = start.elapsed();
        assert!(first >= Duration::from_millis(1000) && first < Duration::from_millis(1010));
        rx.recv().await.unwrap();
        let second = start.elapsed();
        assert!(second >= Duration::from_millis(2000) && second < Duration::from_millis(2010));
        assert_eq!(generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_silent_period() {
        let mut watchdog = LinkWatchdog::new();
        let (on_tick, mut rx) = channel_ticker();
        watchdog.arm(500, on_tick);

        // Grace period
        let generation = rx.recv().await.unwrap();
        assert_eq!(watchdog.on_tick(generation), TickOutcome::Healthy);

        let generation = rx.recv().await.unwrap();
        assert_eq!(watchdog.on_tick(generation), TickOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_keep_it_healthy() {
        let mut watchdog = LinkWatchdog::new();
        let (on_tick, mut rx) = channel_ticker();
        watchdog.arm(500, on_tick);

        for _ in 0..5 {
            let generation = rx.recv().await.unwrap();
            assert_eq!(watchdog.on_tick(generation), TickOutcome::Healthy);
            watchdog.note_sample();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_stops_ticks_and_stales_queued_ones() {
        let mut watchdog = LinkWatchdog::new();
        let (on_tick, mut rx) = channel_ticker();
        watchdog.arm(100, on_tick);

        let generation = rx.recv().await.unwrap();
        watchdog.disarm();
        assert!(!watchdog.is_armed());
        assert_eq!(watchdog.on_tick(generation), TickOutcome::Stale);

        sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_ignores_old_generation() {
        let mut watchdog = LinkWatchdog::new();
        let (on_tick, mut rx) = channel_ticker();
        watchdog.arm(100, on_tick);
        let old = rx.recv().await.unwrap();

        watchdog.disarm();
        let (on_tick, mut rx) = channel_ticker();
        watchdog.arm(100, on_tick);

        assert_eq!(watchdog.on_tick(old), TickOutcome::Stale);
        let current = rx.recv().await.unwrap();
        assert_ne!(current, old);
        assert_eq!(watchdog.on_tick(current), TickOutcome::Healthy);
    }

    #[tokio::test]
    #[should_panic(expected = "already running")]
    async fn test_double_arm_panics() {
        let mut watchdog = LinkWatchdog::new();
        watchdog.arm(1000, |_| true);
        watchdog.arm(1000, |_| true);
    }
}
