//! # Payload Module
//!
//! Canonical QR payload for offline scanners.
//!
//! This module handles:
//! - Fixed field set, order and numeric precision
//! - Deterministic encoding with a capacity budget
//! - Keyed, forward-compatible decoding

pub mod decoder;
pub mod encoder;
pub mod protocol;

pub use decoder::{decode, DecodedPayload};
pub use encoder::{encode, PayloadEncoder};
