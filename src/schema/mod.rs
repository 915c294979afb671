//! Decoded ride input schema
//!
//! This module defines the boundary with the decoding collaborator: the
//! per-ride `(timestamp, power)` sample lists and the file formats they are
//! delivered in (JSON, NDJSON, CSV).

mod adapter;
mod sample;

pub use adapter::*;
pub use sample::*;
