//! Payload parsing: webhook envelope decoding and timestamp handling.

pub mod date;
pub mod envelope;
