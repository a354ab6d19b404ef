//! # Telemetry Entities
//!
//! Strictly typed units, snapshots and history produced by the normalizer.
//! Every field except the identity keys may be absent; consumers render an
//! absent value as such instead of substituting a default.

use chrono::{DateTime, Utc};

/// Status string the backend uses for a healthy unit.
pub const STATUS_SAFE: &str = "SAFE";

/// Status string the backend uses for a degraded unit.
pub const STATUS_WARNING: &str = "WARNING";

/// One tracked blood bag as of its last observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Stable unique key (`bag_id` on the wire)
    pub id: String,

    /// Blood type, immutable for the unit's lifetime
    pub category: Option<String>,

    /// Upstream model output, expected in [0, 1]
    pub predicted_health_index: Option<f64>,

    /// Opaque status label computed upstream
    pub status: Option<String>,

    /// Rolling mean temperature in degrees Celsius
    pub temp_mean: Option<f64>,

    /// Rolling mean relative humidity in percent
    pub hum_mean: Option<f64>,

    /// RMS of acceleration (vibration)
    pub accel_rms: Option<f64>,

    /// Number of door openings observed
    pub door_count: Option<u64>,

    /// Last observation time
    pub timestamp: Option<DateTime<Utc>>,

    /// Delivery route, display only
    pub route: Option<String>,

    /// Human readable reason attached to a degraded status, display only
    pub card_reason: Option<String>,
}

impl Unit {
    /// Create a unit with only its identity set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: None,
            predicted_health_index: None,
            status: None,
            temp_mean: None,
            hum_mean: None,
            accel_rms: None,
            door_count: None,
            timestamp: None,
            route: None,
            card_reason: None,
        }
    }

    /// Display class derived from the opaque status label.
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status.as_deref())
    }
}

/// Visual grouping of the opaque status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Safe,
    Warning,
    /// Any other label, including a missing one
    Unsafe,
}

impl StatusClass {
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some(STATUS_SAFE) => StatusClass::Safe,
            Some(STATUS_WARNING) => StatusClass::Warning,
            _ => StatusClass::Unsafe,
        }
    }

    /// Lowercase name used as a style class by renderers.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Safe => "safe",
            StatusClass::Warning => "warning",
            StatusClass::Unsafe => "unsafe",
        }
    }
}

/// Full replacement view of all tracked units at one point in time.
///
/// Never mutated in place: each successful poll produces a new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Units in display order, ids unique
    pub units: Vec<Unit>,

    /// Backend clock at the time the snapshot was produced
    pub server_time: Option<DateTime<Utc>>,

    /// Backend sampling interval
    pub interval_seconds: Option<u32>,
}

impl Snapshot {
    /// Look up a unit by id.
    pub fn find(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    /// Id of the first unit in display order.
    pub fn first_id(&self) -> Option<&str> {
        self.units.first().map(|unit| unit.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// One telemetry sample for a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub predicted_health_index: Option<f64>,
    pub status: Option<String>,
    pub temp_mean: Option<f64>,
    pub hum_mean: Option<f64>,
    pub accel_rms: Option<f64>,
    pub door_count: Option<u64>,
}

impl HistoryRecord {
    /// Create a record with only its timestamp set.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            predicted_health_index: None,
            status: None,
            temp_mean: None,
            hum_mean: None,
            accel_rms: None,
            door_count: None,
        }
    }
}

/// Time-ordered samples for exactly one unit.
///
/// Construction sorts records by timestamp, so any `History` handed to a
/// renderer is non-decreasing regardless of what the backend sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    unit_id: Option<String>,
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new(unit_id: impl Into<String>, mut records: Vec<HistoryRecord>) -> Self {
        // Stable sort keeps backend order for equal timestamps
        records.sort_by_key(|record| record.timestamp);
        Self {
            unit_id: Some(unit_id.into()),
            records,
        }
    }

    /// Id the records belong to, `None` for the empty placeholder.
    pub fn unit_id(&self) -> Option<&str> {
        self.unit_id.as_deref()
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Last `max_points` samples of one metric, skipping absent values.
    pub fn series(&self, metric: Metric, max_points: usize) -> Vec<(DateTime<Utc>, f64)> {
        let start = self.records.len().saturating_sub(max_points);
        self.records[start..]
            .iter()
            .filter_map(|record| metric.record_value(record).map(|v| (record.timestamp, v)))
            .collect()
    }
}

/// Numeric telemetry fields shared by units and history records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    HealthIndex,
    TempMean,
    HumMean,
    DoorCount,
    AccelRms,
}

impl Metric {
    /// Chart order used by the detail panel.
    pub const ALL: [Metric; 5] = [
        Metric::HealthIndex,
        Metric::TempMean,
        Metric::HumMean,
        Metric::DoorCount,
        Metric::AccelRms,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Metric::HealthIndex => "Health Index",
            Metric::TempMean => "Temperature",
            Metric::HumMean => "Humidity",
            Metric::DoorCount => "Door Count",
            Metric::AccelRms => "Vibration",
        }
    }

    pub fn record_value(&self, record: &HistoryRecord) -> Option<f64> {
        match self {
            Metric::HealthIndex => record.predicted_health_index,
            Metric::TempMean => record.temp_mean,
            Metric::HumMean => record.hum_mean,
            Metric::DoorCount => record.door_count.map(|c| c as f64),
            Metric::AccelRms => record.accel_rms,
        }
    }
}
