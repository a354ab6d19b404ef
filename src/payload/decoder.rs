//! # Canonical Payload Decoder
//!
//! Scanner-side reconstruction of a unit's last-known telemetry from a QR
//! payload. Fields are read by key; unknown keys are ignored so that newer
//! payloads remain readable.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::protocol::*;
use crate::error::{BagwatchError, Result};
use crate::model::normalize::{coerce_count, coerce_f64, parse_timestamp};
use crate::model::Unit;

/// Telemetry recovered from a scanned payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub bag_id: String,
    pub blood_type: Option<String>,
    pub health_index: Option<f64>,
    pub status: Option<String>,
    pub temp_mean: Option<f64>,
    pub hum_mean: Option<f64>,
    pub accel_rms: Option<f64>,
    pub door_count: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl DecodedPayload {
    /// Rebuild a [`Unit`] carrying the decoded values.
    ///
    /// Numeric values carry the payload's reduced precision.
    pub fn into_unit(self) -> Unit {
        let mut unit = Unit::new(self.bag_id);
        unit.category = self.blood_type;
        unit.predicted_health_index = self.health_index;
        unit.status = self.status;
        unit.temp_mean = self.temp_mean;
        unit.hum_mean = self.hum_mean;
        unit.accel_rms = self.accel_rms;
        unit.door_count = self.door_count;
        unit.timestamp = self.timestamp;
        unit
    }
}

/// Decode a canonical payload string.
///
/// # Errors
///
/// Returns error if:
/// - The payload is not valid JSON
/// - The payload is not a JSON object
/// - `bag_id` is missing or not a string
pub fn decode(payload: &str) -> Result<DecodedPayload> {
    let value: Value = serde_json::from_str(payload)?;
    let obj = value
        .as_object()
        .ok_or_else(|| BagwatchError::Normalization("payload is not a JSON object".to_string()))?;

    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| obj.get(key).and_then(coerce_f64);

    let bag_id = text(FIELD_BAG_ID)
        .ok_or_else(|| BagwatchError::Normalization("payload has no bag_id".to_string()))?;

    Ok(DecodedPayload {
        bag_id,
        blood_type: text(FIELD_BLOOD_TYPE),
        health_index: number(FIELD_HEALTH_INDEX),
        status: text(FIELD_STATUS),
        temp_mean: number(FIELD_TEMP_MEAN),
        hum_mean: number(FIELD_HUM_MEAN),
        accel_rms: number(FIELD_ACCEL_RMS),
        door_count: obj.get(FIELD_DOOR_COUNT).and_then(coerce_count),
        timestamp: obj.get(FIELD_TIMESTAMP).and_then(parse_timestamp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::encoder::encode;
    use chrono::TimeZone;

    const GOLDEN: &str = r#"{"bag_id":"BAG-001","blood_type":"O+","health_index":"0.8734","status":"SAFE","temp_mean":"4.21","hum_mean":"62.5","accel_rms":"0.123","door_count":3,"timestamp":"2024-01-01T00:00:00Z"}"#;

    #[test]
    fn test_decode_golden_payload() {
        let decoded = decode(GOLDEN).unwrap();
        assert_eq!(decoded.bag_id, "BAG-001");
        assert_eq!(decoded.blood_type.as_deref(), Some("O+"));
        assert_eq!(decoded.health_index, Some(0.8734));
        assert_eq!(decoded.status.as_deref(), Some("SAFE"));
        assert_eq!(decoded.temp_mean, Some(4.21));
        assert_eq!(decoded.hum_mean, Some(62.5));
        assert_eq!(decoded.accel_rms, Some(0.123));
        assert_eq!(decoded.door_count, Some(3));
        assert_eq!(
            decoded.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_ignores_unknown_keys() {
        let payload = r#"{"schema":2,"bag_id":"BAG-002","facility":"BloodBank","status":"WARNING","extra":{"a":[1,2]}}"#;
        let decoded = decode(payload).unwrap();
        assert_eq!(decoded.bag_id, "BAG-002");
        assert_eq!(decoded.status.as_deref(), Some("WARNING"));
        assert_eq!(decoded.temp_mean, None);
    }

    #[test]
    fn test_decode_is_order_independent() {
        let reordered = r#"{"timestamp":"2024-01-01T00:00:00Z","door_count":3,"bag_id":"BAG-001","accel_rms":"0.123","hum_mean":"62.5","temp_mean":"4.21","status":"SAFE","health_index":"0.8734","blood_type":"O+"}"#;
        assert_eq!(decode(reordered).unwrap(), decode(GOLDEN).unwrap());
    }

    #[test]
    fn test_decode_nulls() {
        let payload = encode(&Unit::new("BAG_0009")).unwrap();
        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.into_unit(), Unit::new("BAG_0009"));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode("not json"), Err(BagwatchError::Json(_))));
        assert!(matches!(decode("[1,2]"), Err(BagwatchError::Normalization(_))));
        assert!(matches!(decode(r#"{"status":"SAFE"}"#), Err(BagwatchError::Normalization(_))));
    }

    #[test]
    fn test_decoded_unit_reencodes_identically() {
        let unit = decode(GOLDEN).unwrap().into_unit();
        assert_eq!(encode(&unit).unwrap(), GOLDEN);
    }
}
