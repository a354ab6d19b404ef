//! # Bagwatch Library
//!
//! Live telemetry viewer core for blood bag cold-chain monitoring.
//!
//! This library polls a monitoring backend for snapshots of all tracked
//! bags and the history of the selected bag, keeps a race-free view of both
//! under periodic refresh, and encodes a bag's last-known telemetry into a
//! canonical payload for QR codes that offline scanners can read.

pub mod config;
pub mod error;
pub mod model;
pub mod payload;
pub mod source;
pub mod sync;
pub mod view;
