//! # Canonical Payload Protocol
//!
//! Field names, order and numeric precision of the QR payload. Changing any
//! of these changes the wire format read by offline scanners.

/// Capacity budget for a payload rendered at error-correction level H.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 300;

/// Byte capacity of the largest QR symbol (version 40) at level H.
pub const QR_MAX_BYTES_ECC_HIGH: usize = 1273;

pub const FIELD_BAG_ID: &str = "bag_id";
pub const FIELD_BLOOD_TYPE: &str = "blood_type";
pub const FIELD_HEALTH_INDEX: &str = "health_index";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_TEMP_MEAN: &str = "temp_mean";
pub const FIELD_HUM_MEAN: &str = "hum_mean";
pub const FIELD_ACCEL_RMS: &str = "accel_rms";
pub const FIELD_DOOR_COUNT: &str = "door_count";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Canonical field order.
pub const CANONICAL_FIELDS: [&str; 9] = [
    FIELD_BAG_ID,
    FIELD_BLOOD_TYPE,
    FIELD_HEALTH_INDEX,
    FIELD_STATUS,
    FIELD_TEMP_MEAN,
    FIELD_HUM_MEAN,
    FIELD_ACCEL_RMS,
    FIELD_DOOR_COUNT,
    FIELD_TIMESTAMP,
];

/// Decimal places for `health_index`
pub const HEALTH_INDEX_DECIMALS: usize = 4;

/// Decimal places for `temp_mean`
pub const TEMP_MEAN_DECIMALS: usize = 2;

/// Decimal places for `hum_mean`
pub const HUM_MEAN_DECIMALS: usize = 1;

/// Decimal places for `accel_rms`
pub const ACCEL_RMS_DECIMALS: usize = 3;
