//! # Selection Model
//!
//! Holds the id of the unit under inspection. Selection is sticky: a poll
//! never clears or moves it, even if the id disappears from the snapshot.
//! The only automatic change is the first-selection default.

use crate::model::Snapshot;

/// Resolve the selection against a freshly received snapshot.
///
/// With no current selection and a non-empty snapshot, the first unit in
/// display order is selected. Otherwise the current selection is returned
/// unchanged.
pub fn resolve(snapshot: &Snapshot, current: Option<&str>) -> Option<String> {
    match current {
        Some(id) => Some(id.to_string()),
        None => snapshot.first_id().map(str::to_string),
    }
}

/// Owner of the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    selected: Option<String>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected id, `None` before anything was selected
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Re-run [`resolve`] against `snapshot`, returning whether the
    /// selection changed.
    pub fn resolve_against(&mut self, snapshot: &Snapshot) -> bool {
        let resolved = resolve(snapshot, self.selected());
        if resolved == self.selected {
            return false;
        }
        self.selected = resolved;
        true
    }

    /// Select `id`, which need not be present in any snapshot yet.
    ///
    /// Returns whether the selection changed.
    pub fn set_selection(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.selected.as_deref() == Some(id.as_str()) {
            return false;
        }
        self.selected = Some(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;

    fn snapshot(ids: &[&str]) -> Snapshot {
        Snapshot {
            units: ids.iter().map(|id| Unit::new(*id)).collect(),
            server_time: None,
            interval_seconds: Some(15),
        }
    }

    #[test]
    fn test_resolve_defaults_to_first_unit() {
        assert_eq!(resolve(&snapshot(&["X", "Y", "Z"]), None), Some("X".to_string()));
    }

    #[test]
    fn test_resolve_empty_snapshot_keeps_none() {
        assert_eq!(resolve(&snapshot(&[]), None), None);
    }

    #[test]
    fn test_resolve_is_sticky() {
        assert_eq!(resolve(&snapshot(&["Z", "X", "Y"]), Some("X")), Some("X".to_string()));
        assert_eq!(resolve(&snapshot(&["Y", "Z"]), Some("X")), Some("X".to_string()));
        assert_eq!(resolve(&snapshot(&[]), Some("X")), Some("X".to_string()));
    }

    #[test]
    fn test_first_selection_happens_once() {
        let mut model = SelectionModel::new();
        assert!(model.resolve_against(&snapshot(&["X", "Y", "Z"])));
        assert_eq!(model.selected(), Some("X"));

        assert!(!model.resolve_against(&snapshot(&["Z", "X", "Y"])));
        assert_eq!(model.selected(), Some("X"));
    }

    #[test]
    fn test_empty_snapshot_does_not_select() {
        let mut model = SelectionModel::new();
        assert!(!model.resolve_against(&snapshot(&[])));
        assert_eq!(model.selected(), None);
    }

    #[test]
    fn test_set_selection_accepts_unknown_id() {
        let mut model = SelectionModel::new();
        assert!(model.set_selection("BAG_0042"));
        assert_eq!(model.selected(), Some("BAG_0042"));
        assert!(!model.set_selection("BAG_0042"));

        // Disappearance from the snapshot never resets it
        assert!(!model.resolve_against(&snapshot(&["A", "B"])));
        assert_eq!(model.selected(), Some("BAG_0042"));
    }
}
