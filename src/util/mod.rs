//! Utility types shared across the engine.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Logger`] / [`Severity`] - Explicit logging handles
//! - [`ContentKey`] - Content digests for write skipping
//! - [`compression`] - zlib framing for binary payloads

mod error;
mod log;
mod digest;
pub mod compression;

pub use error::*;
pub use log::*;
pub use digest::*;

/// Time code on the scene timeline.
pub type TimeCode = f64;

/// Opaque entity key, unique per (actor, kind).
pub type EntityId = u64;
