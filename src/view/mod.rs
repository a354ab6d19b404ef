//! # View Module
//!
//! Read-only rendering model built from a published [`SyncStore`]. Nothing
//! here mutates state; a view is rebuilt from every store the poller
//! publishes.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{BagwatchError, Result};
use crate::model::{Metric, StatusClass, Unit};
use crate::payload::PayloadEncoder;
use crate::sync::{SelectedUnit, SyncStore};

/// Most recent history points drawn per chart
pub const CHART_POINTS: usize = 60;

/// A chart with fewer points than this is omitted
pub const MIN_CHART_POINTS: usize = 2;

/// Sample interval shown when the snapshot does not report one
pub const DEFAULT_SAMPLE_INTERVAL_S: u32 = 15;

/// QR payload state for one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
    Ready(String),
    /// Encoding exceeded the configured byte budget
    TooLarge { len: usize, limit: usize },
}

impl QrPayload {
    fn for_unit(encoder: &PayloadEncoder, unit: &Unit) -> Option<Self> {
        Self::from_encoded(&unit.id, encoder.encode(unit))
    }

    /// Map an encode result to a payload state; other errors yield no payload.
    fn from_encoded(unit_id: &str, encoded: Result<String>) -> Option<Self> {
        match encoded {
            Ok(payload) => Some(QrPayload::Ready(payload)),
            Err(BagwatchError::EncodingOverflow { len, limit }) => {
                Some(QrPayload::TooLarge { len, limit })
            }
            Err(e) => {
                warn!("No QR payload for {}: {}", unit_id, e);
                None
            }
        }
    }

    pub fn as_ready(&self) -> Option<&str> {
        match self {
            QrPayload::Ready(payload) => Some(payload),
            QrPayload::TooLarge { .. } => None,
        }
    }
}

/// Summary card for one unit of the snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCard {
    pub id: String,
    pub health: Option<f64>,
    pub status: StatusClass,
    pub selected: bool,
}

/// Time series of a single metric
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub metric: Metric,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

impl Chart {
    pub fn title(&self) -> &'static str {
        self.metric.title()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitDetail {
    pub unit: Unit,
    pub charts: Vec<Chart>,
    pub history_points: usize,
    pub qr: Option<QrPayload>,
}

/// Detail panel state
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    /// No snapshot yet, or an empty one with nothing selected
    NoData,
    Unselected,
    /// The selected id is not in the latest snapshot
    NotFound(String),
    Found(Box<UnitDetail>),
}

/// Everything a renderer needs from one published store
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub unit_count: usize,
    pub server_time: Option<DateTime<Utc>>,
    pub sample_interval_s: u32,
    pub cards: Vec<UnitCard>,
    pub detail: Detail,
}

impl DashboardView {
    pub fn from_store(store: &SyncStore) -> Self {
        let snapshot = store.current_snapshot();
        let selected = store.selected_id();

        let cards = snapshot
            .map(|s| {
                s.units
                    .iter()
                    .map(|unit| UnitCard {
                        id: unit.id.clone(),
                        health: unit.predicted_health_index,
                        status: unit.status_class(),
                        selected: selected == Some(unit.id.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            unit_count: snapshot.map_or(0, |s| s.len()),
            server_time: snapshot.and_then(|s| s.server_time),
            sample_interval_s: snapshot
                .and_then(|s| s.interval_seconds)
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL_S),
            cards,
            detail: build_detail(store),
        }
    }

    /// Payload ready to be rendered as a QR code, if any
    pub fn qr_payload(&self) -> Option<&str> {
        match &self.detail {
            Detail::Found(detail) => detail.qr.as_ref().and_then(QrPayload::as_ready),
            _ => None,
        }
    }
}

fn build_detail(store: &SyncStore) -> Detail {
    let snapshot = store.current_snapshot();

    match store.current_selection_unit() {
        SelectedUnit::Unselected => match snapshot {
            Some(s) if !s.is_empty() => Detail::Unselected,
            _ => Detail::NoData,
        },
        _ if snapshot.is_none() => Detail::NoData,
        SelectedUnit::NotFound(id) => Detail::NotFound(id.to_string()),
        SelectedUnit::Found(unit) => {
            let history = store.current_history();
            let charts = Metric::ALL
                .iter()
                .map(|&metric| Chart {
                    metric,
                    points: history.series(metric, CHART_POINTS),
                })
                .filter(|chart| chart.points.len() >= MIN_CHART_POINTS)
                .collect();

            Detail::Found(Box::new(UnitDetail {
                unit: unit.clone(),
                charts,
                history_points: history.len(),
                qr: QrPayload::for_unit(&store.encoder(), unit),
            }))
        }
    }
}
