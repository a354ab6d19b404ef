//! # Scheduler
//!
//! Tick sources for the two polling cycles. Production code uses tokio
//! intervals; tests use [`ManualScheduler`] and fire ticks explicitly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// The two independent fetch cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cycle {
    Snapshot,
    History,
}

/// A repeating tick
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick
    async fn tick(&mut self);
}

/// Factory for cycle tickers
pub trait Scheduler {
    /// Ticker firing every `period`, first tick one period from now.
    fn every(&self, cycle: Cycle, period: Duration) -> Box<dyn Ticker>;
}

/// Wall-clock scheduler backed by `tokio::time::interval`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

struct IntervalTicker {
    interval: Interval,
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, _cycle: Cycle, period: Duration) -> Box<dyn Ticker> {
        let mut interval = interval_at(Instant::now() + period, period);
        // Fetches run off-loop, so a late tick is still delivered
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Box::new(IntervalTicker { interval })
    }
}

/// Scheduler whose ticks are fired by hand
///
/// Clones share the same tickers, so a test can keep one clone and hand
/// another to the poller.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    triggers: Arc<Mutex<HashMap<Cycle, mpsc::UnboundedSender<()>>>>,
}

struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            // Scheduler gone: never tick again
            std::future::pending::<()>().await;
        }
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one tick on `cycle`.
    ///
    /// Returns `false` if no live ticker exists for the cycle.
    pub fn fire(&self, cycle: Cycle) -> bool {
        match self.triggers.lock() {
            Ok(triggers) => triggers
                .get(&cycle)
                .map(|tx| tx.send(()).is_ok())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, cycle: Cycle, _period: Duration) -> Box<dyn Ticker> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut triggers) = self.triggers.lock() {
            triggers.insert(cycle, tx);
        }
        Box::new(ManualTicker { rx })
    }
}
