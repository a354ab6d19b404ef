//! # Schema Normalizer
//!
//! Maps untyped backend JSON onto the strict entities in [`super::types`].
//!
//! All "maybe missing, maybe wrong type" handling lives here:
//! - Numeric fields accept JSON numbers or numeric strings; anything else,
//!   including non-finite results, becomes `None`
//! - Timestamps accept RFC 3339 strings, offset-less ISO-8601 strings (read
//!   as UTC) and epoch numbers (seconds, or milliseconds above 1e11)
//! - A record missing its key (`bag_id` for units, `timestamp` for history
//!   samples) is dropped from its batch; the rest of the batch proceeds

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::types::{History, HistoryRecord, Snapshot, Unit};
use crate::error::{BagwatchError, Result};

/// Epoch magnitudes above this are read as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Offset-less layouts accepted after RFC 3339 fails.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const ID_KEYS: &[&str] = &["bag_id", "id"];
const HEALTH_KEYS: &[&str] = &["predicted_health_index", "health_index"];

/// Normalize one raw unit object.
///
/// # Errors
///
/// Returns `Normalization` if the value is not an object or carries no id.
pub fn normalize_unit(raw: &Value) -> Result<Unit> {
    let obj = as_object(raw, "unit")?;
    let id = first_of(obj, ID_KEYS)
        .and_then(coerce_string)
        .ok_or_else(|| BagwatchError::Normalization("unit has no bag_id".to_string()))?;

    Ok(Unit {
        id,
        category: obj.get("blood_type").and_then(coerce_string),
        predicted_health_index: first_of(obj, HEALTH_KEYS).and_then(coerce_f64),
        status: obj.get("status").and_then(coerce_string),
        temp_mean: obj.get("temp_mean").and_then(coerce_f64),
        hum_mean: obj.get("hum_mean").and_then(coerce_f64),
        accel_rms: obj.get("accel_rms").and_then(coerce_f64),
        door_count: obj.get("door_count").and_then(coerce_count),
        timestamp: obj.get("timestamp").and_then(parse_timestamp),
        route: obj.get("route").and_then(coerce_string),
        card_reason: obj.get("card_reason").and_then(coerce_string),
    })
}

/// Normalize one raw history sample.
///
/// # Errors
///
/// Returns `Normalization` if the value is not an object or its timestamp
/// is missing or unparseable.
pub fn normalize_history_record(raw: &Value) -> Result<HistoryRecord> {
    let obj = as_object(raw, "history record")?;
    let timestamp = obj
        .get("timestamp")
        .and_then(parse_timestamp)
        .ok_or_else(|| BagwatchError::Normalization("history record has no valid timestamp".to_string()))?;

    Ok(HistoryRecord {
        timestamp,
        predicted_health_index: first_of(obj, HEALTH_KEYS).and_then(coerce_f64),
        status: obj.get("status").and_then(coerce_string),
        temp_mean: obj.get("temp_mean").and_then(coerce_f64),
        hum_mean: obj.get("hum_mean").and_then(coerce_f64),
        accel_rms: obj.get("accel_rms").and_then(coerce_f64),
        door_count: obj.get("door_count").and_then(coerce_count),
    })
}

/// Normalize a batch of raw units, dropping malformed entries and
/// duplicate ids (first occurrence wins).
pub fn normalize_units(raw: &[Value]) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::with_capacity(raw.len());

    for (index, item) in raw.iter().enumerate() {
        match normalize_unit(item) {
            Ok(unit) => {
                if units.iter().any(|existing| existing.id == unit.id) {
                    warn!("Dropping duplicate unit {} at index {}", unit.id, index);
                    continue;
                }
                units.push(unit);
            }
            Err(e) => warn!("Dropping unit at index {}: {}", index, e),
        }
    }

    units
}

/// Normalize a `GET /snapshot` response body.
///
/// # Errors
///
/// Returns `Normalization` if the envelope is not an object or has no
/// `bags` array. Individual bad units never fail the snapshot.
pub fn normalize_snapshot(raw: &Value) -> Result<Snapshot> {
    let obj = as_object(raw, "snapshot")?;
    let bags = obj
        .get("bags")
        .and_then(Value::as_array)
        .ok_or_else(|| BagwatchError::Normalization("snapshot has no bags array".to_string()))?;

    let units = normalize_units(bags);
    debug!("Normalized snapshot: {} of {} units kept", units.len(), bags.len());

    Ok(Snapshot {
        units,
        server_time: obj.get("server_time").and_then(parse_timestamp),
        interval_seconds: obj
            .get("interval_seconds")
            .and_then(coerce_count)
            .and_then(|v| u32::try_from(v).ok()),
    })
}

/// Normalize a `GET /history/{bag_id}` response body for `unit_id`.
///
/// A missing `records` array yields an empty history. Samples tagged with
/// a different `bag_id` are dropped.
///
/// # Errors
///
/// Returns `Normalization` if the envelope is not an object.
pub fn normalize_history(unit_id: &str, raw: &Value) -> Result<History> {
    let obj = as_object(raw, "history")?;
    let Some(items) = obj.get("records").and_then(Value::as_array) else {
        debug!("History for {} has no records array", unit_id);
        return Ok(History::new(unit_id, Vec::new()));
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let owner = item.get("bag_id").and_then(coerce_string);
        if let Some(owner) = owner.filter(|owner| owner != unit_id) {
            warn!("Dropping history record {} for {}: belongs to {}", index, unit_id, owner);
            continue;
        }

        match normalize_history_record(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Dropping history record {} for {}: {}", index, unit_id, e),
        }
    }

    Ok(History::new(unit_id, records))
}

/// Parse a timestamp given as a string or an epoch number.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    s.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }

    if value.abs() > EPOCH_MILLIS_THRESHOLD {
        return Utc.timestamp_millis_opt(value.round() as i64).single();
    }

    let secs = value.floor();
    let nanos = ((value - secs) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(secs as i64, nanos).single()
}

/// Coerce a JSON number or numeric string into a finite `f64`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

/// Coerce a JSON value into a non-negative integer count.
///
/// Integral floats (`3.0`) are accepted; negative or fractional values are not.
pub fn coerce_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.trim().parse::<u64>() {
            return Some(n);
        }
    }

    let v = coerce_f64(value)?;
    (v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64)
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn as_object<'a>(raw: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    raw.as_object()
        .ok_or_else(|| BagwatchError::Normalization(format!("{} is not a JSON object", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jan_first() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_normalize_full_unit() {
        let raw = json!({
            "bag_id": "BAG_0001",
            "blood_type": "O+",
            "predicted_health_index": 0.8734,
            "status": "SAFE",
            "temp_mean": 4.21,
            "hum_mean": 62.5,
            "accel_rms": 0.123,
            "door_count": 3,
            "timestamp": "2024-01-01T00:00:00Z",
            "route": "Hospital_1",
            "card_reason": null
        });

        let unit = normalize_unit(&raw).unwrap();
        assert_eq!(unit.id, "BAG_0001");
        assert_eq!(unit.category.as_deref(), Some("O+"));
        assert_eq!(unit.predicted_health_index, Some(0.8734));
        assert_eq!(unit.status.as_deref(), Some("SAFE"));
        assert_eq!(unit.temp_mean, Some(4.21));
        assert_eq!(unit.hum_mean, Some(62.5));
        assert_eq!(unit.accel_rms, Some(0.123));
        assert_eq!(unit.door_count, Some(3));
        assert_eq!(unit.timestamp, Some(jan_first()));
        assert_eq!(unit.route.as_deref(), Some("Hospital_1"));
        assert_eq!(unit.card_reason, None);
    }

    #[test]
    fn test_missing_fields_become_none() {
        let unit = normalize_unit(&json!({ "bag_id": "BAG_0002" })).unwrap();
        assert_eq!(unit, Unit::new("BAG_0002"));
    }

    #[test]
    fn test_wrong_types_become_none() {
        let raw = json!({
            "bag_id": "BAG_0003",
            "predicted_health_index": "not a number",
            "temp_mean": true,
            "hum_mean": [1, 2],
            "accel_rms": {},
            "door_count": -2,
            "timestamp": false
        });

        let unit = normalize_unit(&raw).unwrap();
        assert_eq!(unit, Unit::new("BAG_0003"));
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let raw = json!({ "bag_id": "B", "temp_mean": " 4.5 ", "door_count": "7" });
        let unit = normalize_unit(&raw).unwrap();
        assert_eq!(unit.temp_mean, Some(4.5));
        assert_eq!(unit.door_count, Some(7));
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!("inf")), None);
        assert_eq!(coerce_f64(&json!("-Infinity")), None);
    }

    #[test]
    fn test_door_count_coercion() {
        assert_eq!(coerce_count(&json!(3)), Some(3));
        assert_eq!(coerce_count(&json!(3.0)), Some(3));
        assert_eq!(coerce_count(&json!(3.5)), None);
        assert_eq!(coerce_count(&json!(-1)), None);
        assert_eq!(coerce_count(&json!(null)), None);
    }

    #[test]
    fn test_unit_without_id_is_rejected() {
        assert!(normalize_unit(&json!({ "blood_type": "A-" })).is_err());
        assert!(normalize_unit(&json!({ "bag_id": "   " })).is_err());
        assert!(normalize_unit(&json!({ "bag_id": null })).is_err());
        assert!(normalize_unit(&json!("BAG_0001")).is_err());
    }

    #[test]
    fn test_id_fallback_and_numeric_id() {
        assert_eq!(normalize_unit(&json!({ "id": "BAG_9" })).unwrap().id, "BAG_9");
        assert_eq!(normalize_unit(&json!({ "bag_id": 42 })).unwrap().id, "42");
    }

    #[test]
    fn test_timestamp_forms() {
        let expected = jan_first();
        assert_eq!(parse_timestamp(&json!("2024-01-01T00:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-01T01:00:00+01:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-01T00:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-01 00:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!(1_704_067_200)), Some(expected));
        assert_eq!(parse_timestamp(&json!(1_704_067_200_000_i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("1704067200")), Some(expected));
    }

    #[test]
    fn test_python_isoformat_with_micros() {
        let ts = parse_timestamp(&json!("2024-01-01T00:00:00.250000")).unwrap();
        assert_eq!(ts, jan_first() + chrono::Duration::milliseconds(250));
    }

    #[test]
    fn test_fractional_epoch_seconds() {
        let ts = parse_timestamp(&json!(1_704_067_200.5)).unwrap();
        assert_eq!(ts, jan_first() + chrono::Duration::milliseconds(500));
    }

    #[test]
    fn test_unparseable_timestamps() {
        assert_eq!(parse_timestamp(&json!("")), None);
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!({ "t": 1 })), None);
    }

    #[test]
    fn test_normalize_units_drops_malformed_and_duplicates() {
        let raw = vec![
            json!({ "bag_id": "A" }),
            json!({ "blood_type": "O-" }),
            json!(17),
            json!({ "bag_id": "B" }),
            json!({ "bag_id": "A", "status": "WARNING" }),
        ];

        let units = normalize_units(&raw);
        let ids: Vec<_> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(units[0].status, None);
    }

    #[test]
    fn test_normalize_snapshot_envelope() {
        let raw = json!({
            "server_time": "2024-01-01T00:00:00",
            "interval_seconds": 15,
            "bags": [{ "bag_id": "A" }, { "bag_id": "B" }]
        });

        let snapshot = normalize_snapshot(&raw).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.server_time, Some(jan_first()));
        assert_eq!(snapshot.interval_seconds, Some(15));
    }

    #[test]
    fn test_snapshot_without_bags_is_an_error() {
        let err = normalize_snapshot(&json!({ "server_time": "2024-01-01T00:00:00Z" })).unwrap_err();
        assert!(matches!(err, BagwatchError::Normalization(_)));
        assert!(err.is_transient());
        assert!(normalize_snapshot(&json!([])).is_err());
    }

    #[test]
    fn test_snapshot_bad_interval_becomes_none() {
        let raw = json!({ "bags": [], "interval_seconds": "soon" });
        let snapshot = normalize_snapshot(&raw).unwrap();
        assert_eq!(snapshot.interval_seconds, None);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_normalize_history_sorts_and_filters() {
        let raw = json!({
            "bag_id": "A",
            "records": [
                { "bag_id": "A", "timestamp": "2024-01-01T00:00:30Z", "temp_mean": 4.3 },
                { "bag_id": "A", "timestamp": "2024-01-01T00:00:00Z", "temp_mean": 4.1 },
                { "bag_id": "B", "timestamp": "2024-01-01T00:00:10Z", "temp_mean": 9.9 },
                { "bag_id": "A", "temp_mean": 4.2 },
                { "timestamp": "2024-01-01T00:00:15Z", "temp_mean": 4.2 }
            ]
        });

        let history = normalize_history("A", &raw).unwrap();
        let temps: Vec<_> = history.records().iter().map(|r| r.temp_mean).collect();
        assert_eq!(temps, vec![Some(4.1), Some(4.2), Some(4.3)]);
        assert_eq!(history.unit_id(), Some("A"));
    }

    #[test]
    fn test_history_without_records_is_empty() {
        let history = normalize_history("A", &json!({ "bag_id": "A" })).unwrap();
        assert!(history.is_empty());
        assert!(normalize_history("A", &json!("oops")).is_err());
    }
}
