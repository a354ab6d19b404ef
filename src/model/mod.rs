//! # Model Module
//!
//! Typed telemetry entities and the normalization boundary that produces them.
//!
//! This module handles:
//! - Unit, snapshot and history types
//! - Coercing raw backend JSON into those types
//! - Dropping malformed records without failing the batch

pub mod normalize;
pub mod types;

pub use normalize::{normalize_history, normalize_history_record, normalize_snapshot, normalize_unit};
pub use types::{History, HistoryRecord, Metric, Snapshot, StatusClass, Unit};
