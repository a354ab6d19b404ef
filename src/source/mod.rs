//! # Telemetry Source Module
//!
//! Backend access behind a trait so the poller can be driven by a real HTTP
//! client or by test doubles.
//!
//! Contract consumed:
//! - `GET /snapshot` → `{ bags: [...], server_time, interval_seconds }`
//! - `GET /history/{bag_id}` → `{ records: [...] }`
//!
//! Sources return the raw JSON body; normalization happens downstream.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use http::HttpSource;

/// Trait for fetching raw telemetry documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the snapshot of all tracked units
    async fn fetch_snapshot(&self) -> Result<Value>;

    /// Fetch the sample history of one unit
    async fn fetch_history(&self, unit_id: &str) -> Result<Value>;
}
