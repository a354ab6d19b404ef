//! # Polling Controller
//!
//! Runs the snapshot and history fetch cycles and is the single writer of
//! the [`SyncStore`].
//!
//! ## Model
//!
//! One task owns the store and multiplexes, in priority order:
//! - commands from the [`PollerHandle`] (selection changes, stop)
//! - snapshot ticks
//! - history ticks
//! - fetch completions
//!
//! Fetches run as separate tasks in a `JoinSet`, so a slow fetch never
//! delays the next tick. Each fetch carries a [`GenerationToken`]; a
//! completion is applied only if its token is still fresh for its cycle.
//! Changing the selection invalidates every outstanding history token.
//!
//! After every applied change the task publishes a clone of the store on a
//! `watch` channel. Readers only ever see whole, consistent store values.
//!
//! ## Failure handling
//!
//! A failed fetch or unusable response is logged and the previous state is
//! kept. There is no backoff: the next scheduled tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::generation::{Generation, GenerationToken};
use super::scheduler::{Cycle, Scheduler, Ticker};
use super::store::{HistoryUpdate, SyncStore};
use crate::config::PollingConfig;
use crate::error::{BagwatchError, Result};
use crate::model::{normalize_history, normalize_snapshot};
use crate::source::TelemetrySource;

/// Commands sent from the handle to the polling task
#[derive(Debug)]
enum Command {
    Select(String),
    Stop,
}

/// Outcome of one fetch task
#[derive(Debug)]
enum Completion {
    Snapshot {
        token: GenerationToken,
        result: Result<Value>,
    },
    History {
        token: GenerationToken,
        unit_id: String,
        result: Result<Value>,
    },
}

/// Owner of the two fetch cycles
pub struct PollingController<S> {
    source: Arc<S>,
    snapshot_period: Duration,
    history_period: Duration,
}

impl<S: TelemetrySource + 'static> PollingController<S> {
    /// Controller polling `source` at the configured intervals
    pub fn new(source: S, config: &PollingConfig) -> Self {
        Self::with_periods(source, config.snapshot_interval(), config.history_interval())
    }

    pub fn with_periods(source: S, snapshot_period: Duration, history_period: Duration) -> Self {
        Self {
            source: Arc::new(source),
            snapshot_period,
            history_period,
        }
    }

    /// Start both cycles, taking ownership of `store`.
    ///
    /// Both cycles fetch immediately, then on every tick of their ticker.
    /// Must be called from within a tokio runtime.
    pub fn start(self, scheduler: &dyn Scheduler, store: SyncStore) -> PollerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(store.clone()));

        info!(
            "Starting polling: snapshot every {:?}, history every {:?}",
            self.snapshot_period, self.history_period
        );

        let task = PollTask {
            source: self.source,
            store,
            snapshot_gen: Generation::new(),
            history_gen: Generation::new(),
            in_flight: JoinSet::new(),
            view: view_tx,
        };

        let snapshot_ticker = scheduler.every(Cycle::Snapshot, self.snapshot_period);
        let history_ticker = scheduler.every(Cycle::History, self.history_period);

        let join = tokio::spawn(task.run(commands_rx, snapshot_ticker, history_ticker));

        PollerHandle {
            commands: commands_tx,
            view: view_rx,
            join,
        }
    }
}

/// Handle to a running [`PollingController`]
#[derive(Debug)]
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Arc<SyncStore>>,
    join: JoinHandle<SyncStore>,
}

impl PollerHandle {
    /// Select `id` and invalidate any in-flight history fetch for the
    /// previous selection.
    pub fn set_selection(&self, id: impl Into<String>) {
        if self.commands.send(Command::Select(id.into())).is_err() {
            debug!("Poller already stopped, ignoring selection");
        }
    }

    /// Latest published store
    pub fn current(&self) -> Arc<SyncStore> {
        Arc::clone(&self.view.borrow())
    }

    /// Receiver notified whenever the store changes
    pub fn subscribe(&self) -> watch::Receiver<Arc<SyncStore>> {
        self.view.clone()
    }

    /// Stop both cycles and return the final store.
    ///
    /// In-flight fetches are aborted; once this returns no result will
    /// ever be applied.
    pub async fn stop(self) -> Result<SyncStore> {
        let _ = self.commands.send(Command::Stop);
        self.join
            .await
            .map_err(|e| BagwatchError::Task(e.to_string()))
    }
}

struct PollTask<S> {
    source: Arc<S>,
    store: SyncStore,
    snapshot_gen: Generation,
    history_gen: Generation,
    in_flight: JoinSet<Completion>,
    view: watch::Sender<Arc<SyncStore>>,
}

impl<S: TelemetrySource + 'static> PollTask<S> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut snapshot_ticker: Box<dyn Ticker>,
        mut history_ticker: Box<dyn Ticker>,
    ) -> SyncStore {
        self.issue_snapshot();
        self.issue_history();

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Select(id)) => self.select(id),
                    Some(Command::Stop) | None => break,
                },

                _ = snapshot_ticker.tick() => self.issue_snapshot(),

                _ = history_ticker.tick() => self.issue_history(),

                Some(joined) = self.in_flight.join_next() => self.complete(joined),
            }
        }

        self.in_flight.abort_all();
        info!("Polling stopped");
        self.store
    }

    fn issue_snapshot(&mut self) {
        let token = self.snapshot_gen.issue();
        let source = Arc::clone(&self.source);
        debug!("Fetching snapshot {}", token);

        self.in_flight.spawn(async move {
            Completion::Snapshot {
                token,
                result: source.fetch_snapshot().await,
            }
        });
    }

    fn issue_history(&mut self) {
        // Target is read now, not captured at start
        let Some(unit_id) = self.store.selected_id().map(str::to_string) else {
            debug!("No selection, skipping history fetch");
            return;
        };

        let token = self.history_gen.issue();
        let source = Arc::clone(&self.source);
        debug!("Fetching history {} for {}", token, unit_id);

        self.in_flight.spawn(async move {
            let result = source.fetch_history(&unit_id).await;
            Completion::History {
                token,
                unit_id,
                result,
            }
        });
    }

    fn select(&mut self, id: String) {
        if self.store.set_selection(id) {
            self.history_gen.invalidate();
            self.publish();
            self.issue_history();
        }
    }

    fn complete(&mut self, joined: std::result::Result<Completion, JoinError>) {
        let completion = match joined {
            Ok(completion) => completion,
            Err(e) => {
                warn!("Fetch task failed: {}", e);
                return;
            }
        };

        match completion {
            Completion::Snapshot { token, result } => self.complete_snapshot(token, result),
            Completion::History {
                token,
                unit_id,
                result,
            } => self.complete_history(token, unit_id, result),
        }
    }

    fn complete_snapshot(&mut self, token: GenerationToken, result: Result<Value>) {
        let snapshot = match result.and_then(|raw| normalize_snapshot(&raw)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log_failure(&format!("Snapshot {}", token), &e);
                return;
            }
        };

        if !self.snapshot_gen.accept(token) {
            debug!("Discarding superseded snapshot {}", token);
            return;
        }

        let update = self.store.apply_snapshot(snapshot);
        debug!(
            "Applied snapshot {} ({} units)",
            token,
            self.store.current_snapshot().map_or(0, |s| s.len())
        );

        if update.selection_changed {
            self.history_gen.invalidate();
        }
        if update.is_changed() {
            self.publish();
        }
        if update.selection_changed {
            self.issue_history();
        }
    }

    fn complete_history(&mut self, token: GenerationToken, unit_id: String, result: Result<Value>) {
        if !self.history_gen.is_fresh(token) {
            debug!("Discarding superseded history {} for {}", token, unit_id);
            return;
        }

        let history = match result.and_then(|raw| normalize_history(&unit_id, &raw)) {
            Ok(history) => history,
            Err(e) => {
                log_failure(&format!("History {} for {}", token, unit_id), &e);
                return;
            }
        };

        if !self.history_gen.accept(token) {
            return;
        }

        match self.store.apply_history(history) {
            HistoryUpdate::Applied => {
                debug!(
                    "Applied history {} for {} ({} records)",
                    token,
                    unit_id,
                    self.store.current_history().len()
                );
                self.publish();
            }
            HistoryUpdate::Unchanged => debug!("History {} for {} unchanged", token, unit_id),
            HistoryUpdate::Discarded => debug!("Discarding history {} for {}", token, unit_id),
        }
    }

    fn publish(&self) {
        self.view.send_replace(Arc::new(self.store.clone()));
    }
}

/// Log a failed fetch; previous state is kept either way.
fn log_failure(what: &str, err: &BagwatchError) {
    if err.is_transient() {
        warn!("{} failed, keeping previous state: {}", what, err);
    } else {
        error!("{} failed with unexpected error: {}", what, err);
    }
}
