//! # Sync Store
//!
//! Authoritative snapshot, history and selection state. Collections are
//! replaced wholesale and held behind `Arc`, so cloning the store to hand a
//! consistent view to readers is cheap.

use std::sync::Arc;

use tracing::{debug, info};

use super::selection::SelectionModel;
use crate::error::Result;
use crate::model::{History, Snapshot, Unit};
use crate::payload::PayloadEncoder;

/// The selected unit as resolved against the current snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectedUnit<'a> {
    /// Nothing selected yet
    Unselected,
    /// Selected id is absent from the current snapshot
    NotFound(&'a str),
    Found(&'a Unit),
}

/// What a snapshot application changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub snapshot_changed: bool,
    pub selection_changed: bool,
}

impl SnapshotUpdate {
    pub fn is_changed(&self) -> bool {
        self.snapshot_changed || self.selection_changed
    }
}

/// Result of offering a history to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdate {
    Applied,
    /// Same records as already held
    Unchanged,
    /// History belongs to an id that is no longer selected
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStore {
    snapshot: Option<Arc<Snapshot>>,
    history: Arc<History>,
    selection: SelectionModel,
    encoder: PayloadEncoder,
}

impl SyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose payloads are encoded with `encoder`
    pub fn with_encoder(encoder: PayloadEncoder) -> Self {
        Self {
            encoder,
            ..Self::default()
        }
    }

    /// Latest snapshot, `None` until the first successful poll
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_deref()
    }

    /// History of the selected unit; empty until fetched
    pub fn current_history(&self) -> &History {
        &self.history
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selection.selected()
    }

    pub fn encoder(&self) -> PayloadEncoder {
        self.encoder
    }

    /// Resolve the selection against the latest snapshot.
    ///
    /// Never returns a unit from an older snapshot.
    pub fn current_selection_unit(&self) -> SelectedUnit<'_> {
        let Some(id) = self.selection.selected() else {
            return SelectedUnit::Unselected;
        };

        match self.current_snapshot().and_then(|s| s.find(id)) {
            Some(unit) => SelectedUnit::Found(unit),
            None => SelectedUnit::NotFound(id),
        }
    }

    /// Canonical payload of the selected unit, `None` if it is not found.
    pub fn selection_payload(&self) -> Option<Result<String>> {
        match self.current_selection_unit() {
            SelectedUnit::Found(unit) => Some(self.encoder.encode(unit)),
            _ => None,
        }
    }

    /// Replace the snapshot and re-resolve the selection.
    ///
    /// A snapshot equal to the current one changes nothing.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> SnapshotUpdate {
        let snapshot_changed = self.current_snapshot() != Some(&snapshot);
        if snapshot_changed {
            self.snapshot = Some(Arc::new(snapshot));
        }

        let selection_changed = match self.snapshot.as_deref() {
            Some(snapshot) => self.selection.resolve_against(snapshot),
            None => false,
        };
        if selection_changed {
            info!("Selected {} by default", self.selected_id().unwrap_or_default());
            self.history = Arc::new(History::default());
        }

        SnapshotUpdate {
            snapshot_changed,
            selection_changed,
        }
    }

    /// Replace the history if it belongs to the selected unit.
    pub fn apply_history(&mut self, history: History) -> HistoryUpdate {
        if history.unit_id().is_none() || history.unit_id() != self.selected_id() {
            debug!(
                "Discarding history for {:?}, selection is {:?}",
                history.unit_id(),
                self.selected_id()
            );
            return HistoryUpdate::Discarded;
        }

        if *self.history == history {
            return HistoryUpdate::Unchanged;
        }

        self.history = Arc::new(history);
        HistoryUpdate::Applied
    }

    /// Select `id`, clearing the history of the previous selection.
    ///
    /// Returns whether the selection changed.
    pub fn set_selection(&mut self, id: impl Into<String>) -> bool {
        if !self.selection.set_selection(id) {
            return false;
        }
        info!("Selected {}", self.selected_id().unwrap_or_default());
        self.history = Arc::new(History::default());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BagwatchError;
    use crate::model::HistoryRecord;
    use chrono::{TimeZone, Utc};

    fn snapshot(ids: &[&str]) -> Snapshot {
        Snapshot {
            units: ids.iter().map(|id| Unit::new(*id)).collect(),
            server_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            interval_seconds: Some(15),
        }
    }

    fn history(id: &str, n: i64) -> History {
        let records = (0..n)
            .map(|i| HistoryRecord::new(Utc.timestamp_opt(1_704_067_200 + i * 15, 0).unwrap()))
            .collect();
        History::new(id, records)
    }

    #[test]
    fn test_initial_state() {
        let store = SyncStore::new();
        assert!(store.current_snapshot().is_none());
        assert!(store.current_history().is_empty());
        assert_eq!(store.current_selection_unit(), SelectedUnit::Unselected);
        assert!(store.selection_payload().is_none());
    }

    #[test]
    fn test_first_snapshot_selects_first_unit() {
        let mut store = SyncStore::new();
        let update = store.apply_snapshot(snapshot(&["X", "Y", "Z"]));

        assert!(update.snapshot_changed);
        assert!(update.selection_changed);
        assert_eq!(store.selected_id(), Some("X"));

        let update = store.apply_snapshot(snapshot(&["Z", "X", "Y"]));
        assert!(update.snapshot_changed);
        assert!(!update.selection_changed);
        assert_eq!(store.selected_id(), Some("X"));
    }

    #[test]
    fn test_selection_stickiness_reports_not_found() {
        let mut store = SyncStore::new();
        store.apply_snapshot(snapshot(&["A", "B"]));
        store.set_selection("A");
        assert!(matches!(store.current_selection_unit(), SelectedUnit::Found(u) if u.id == "A"));

        store.apply_snapshot(snapshot(&["B", "C"]));
        assert_eq!(store.selected_id(), Some("A"));
        assert_eq!(store.current_selection_unit(), SelectedUnit::NotFound("A"));
        assert!(store.selection_payload().is_none());
    }

    #[test]
    fn test_identical_snapshot_is_idempotent() {
        let mut store = SyncStore::new();
        store.apply_snapshot(snapshot(&["A", "B"]));
        let before = store.clone();

        let update = store.apply_snapshot(snapshot(&["A", "B"]));
        assert!(!update.is_changed());
        assert_eq!(store, before);
    }

    #[test]
    fn test_optimistic_selection_before_snapshot() {
        let mut store = SyncStore::new();
        assert!(store.set_selection("B"));
        assert_eq!(store.current_selection_unit(), SelectedUnit::NotFound("B"));

        let update = store.apply_snapshot(snapshot(&["A", "B"]));
        assert!(!update.selection_changed);
        assert!(matches!(store.current_selection_unit(), SelectedUnit::Found(u) if u.id == "B"));
    }

    #[test]
    fn test_history_scoped_to_selection() {
        let mut store = SyncStore::new();
        store.apply_snapshot(snapshot(&["A", "B"]));

        assert_eq!(store.apply_history(history("B", 3)), HistoryUpdate::Discarded);
        assert!(store.current_history().is_empty());

        assert_eq!(store.apply_history(history("A", 3)), HistoryUpdate::Applied);
        assert_eq!(store.current_history().len(), 3);
        assert_eq!(store.apply_history(history("A", 3)), HistoryUpdate::Unchanged);

        assert_eq!(store.apply_history(History::default()), HistoryUpdate::Discarded);
    }

    #[test]
    fn test_selection_change_clears_history() {
        let mut store = SyncStore::new();
        store.apply_snapshot(snapshot(&["A", "B"]));
        store.apply_history(history("A", 4));

        assert!(!store.set_selection("A"));
        assert_eq!(store.current_history().len(), 4);

        assert!(store.set_selection("B"));
        assert!(store.current_history().is_empty());
        assert_eq!(store.apply_history(history("A", 5)), HistoryUpdate::Discarded);
        assert!(store.current_history().is_empty());
    }

    #[test]
    fn test_selection_payload() {
        let mut store = SyncStore::new();
        store.apply_snapshot(snapshot(&["BAG_0001"]));

        let payload = store.selection_payload().unwrap().unwrap();
        assert!(payload.starts_with(r#"{"bag_id":"BAG_0001""#));
    }

    #[test]
    fn test_selection_payload_overflow_surfaces() {
        let mut store = SyncStore::with_encoder(PayloadEncoder::new(64));
        store.apply_snapshot(snapshot(&["BAG_0001"]));

        match store.selection_payload() {
            Some(Err(BagwatchError::EncodingOverflow { limit, .. })) => assert_eq!(limit, 64),
            other => panic!("Expected overflow, got: {:?}", other),
        }
    }
}
