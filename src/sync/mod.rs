//! # Sync Module
//!
//! Race-free view of the latest snapshot and the selected unit's history
//! under periodic asynchronous refresh.
//!
//! This module handles:
//! - Two independent fetch cycles with generation-token discard
//! - Injectable tick scheduling
//! - Sticky selection across wholesale snapshot replacement
//! - Publishing consistent store values to readers

pub mod generation;
pub mod poller;
pub mod scheduler;
pub mod selection;
pub mod store;

pub use generation::{Generation, GenerationToken};
pub use poller::{PollerHandle, PollingController};
pub use scheduler::{Cycle, ManualScheduler, Scheduler, Ticker, TokioScheduler};
pub use selection::SelectionModel;
pub use store::{HistoryUpdate, SelectedUnit, SnapshotUpdate, SyncStore};
