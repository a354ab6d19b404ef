//! # Canonical Payload Encoder
//!
//! Encodes a [`Unit`] into the JSON string embedded in the bag's QR code.

use chrono::SecondsFormat;
use serde::Serialize;

use super::protocol::*;
use crate::error::{BagwatchError, Result};
use crate::model::Unit;

/// Wire shape of the payload. Field declaration order is the canonical
/// order; `None` serializes as an explicit `null`.
#[derive(Debug, Serialize)]
struct CanonicalPayload<'a> {
    bag_id: &'a str,
    blood_type: Option<&'a str>,
    health_index: Option<String>,
    status: Option<&'a str>,
    temp_mean: Option<String>,
    hum_mean: Option<String>,
    accel_rms: Option<String>,
    door_count: Option<u64>,
    timestamp: Option<String>,
}

impl<'a> CanonicalPayload<'a> {
    fn from_unit(unit: &'a Unit) -> Self {
        Self {
            bag_id: &unit.id,
            blood_type: unit.category.as_deref(),
            health_index: fixed(unit.predicted_health_index, HEALTH_INDEX_DECIMALS),
            status: unit.status.as_deref(),
            temp_mean: fixed(unit.temp_mean, TEMP_MEAN_DECIMALS),
            hum_mean: fixed(unit.hum_mean, HUM_MEAN_DECIMALS),
            accel_rms: fixed(unit.accel_rms, ACCEL_RMS_DECIMALS),
            door_count: unit.door_count,
            timestamp: unit
                .timestamp
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// Payload encoder bound to a capacity budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadEncoder {
    max_bytes: usize,
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

impl PayloadEncoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Encode a unit into its canonical payload.
    ///
    /// Pure and deterministic: the same `Unit` value always yields the same
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns `EncodingOverflow` if the payload exceeds the capacity budget.
    /// The payload is never truncated.
    ///
    /// # Examples
    ///
    /// ```
    /// use bagwatch::model::Unit;
    /// use bagwatch::payload::PayloadEncoder;
    ///
    /// let payload = PayloadEncoder::default().encode(&Unit::new("BAG_0001")).unwrap();
    /// assert!(payload.starts_with(r#"{"bag_id":"BAG_0001","blood_type":null"#));
    /// ```
    pub fn encode(&self, unit: &Unit) -> Result<String> {
        let payload = serde_json::to_string(&CanonicalPayload::from_unit(unit))?;

        if payload.len() > self.max_bytes {
            return Err(BagwatchError::EncodingOverflow {
                len: payload.len(),
                limit: self.max_bytes,
            });
        }

        Ok(payload)
    }
}

/// Encode a unit with the default capacity budget.
pub fn encode(unit: &Unit) -> Result<String> {
    PayloadEncoder::default().encode(unit)
}

/// Format a finite value with fixed decimals; anything else is absent.
fn fixed(value: Option<f64>, decimals: usize) -> Option<String> {
    value.filter(|v| v.is_finite()).map(|v| to_fixed(v, decimals))
}

/// Fraction digits of the exact decimal expansion of any finite `f64`.
const F64_EXACT_FRACTION_DIGITS: usize = 1074;

/// Round `v` to `decimals` places, ties away from zero, on its exact
/// decimal expansion. Matches ECMAScript `Number.prototype.toFixed`
/// below 1e21, including `-0.00` for small negatives.
fn to_fixed(v: f64, decimals: usize) -> String {
    let exact = format!("{:.*}", F64_EXACT_FRACTION_DIGITS, v.abs());
    let (int_part, fraction) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(fraction.bytes().chain(std::iter::repeat(b'0')).take(decimals))
        .collect();

    if fraction.as_bytes().get(decimals).map_or(false, |&d| d >= b'5') {
        let mut carry = true;
        for digit in digits.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let int_len = digits.len() - decimals;
    let mut out = String::with_capacity(digits.len() + 2);
    if v < 0.0 {
        out.push('-');
    }
    out.extend(digits[..int_len].iter().map(|&d| char::from(d)));
    if decimals > 0 {
        out.push('.');
        out.extend(digits[int_len..].iter().map(|&d| char::from(d)));
    }
    out
}
