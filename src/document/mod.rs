//! Hierarchical, time-sampled documents.
//!
//! - [`PrimPath`] - absolute prim paths
//! - [`Value`] / [`ValueType`] - typed attribute values
//! - [`Layer`] - one document and its edit operations
//! - [`compose`] - flatten a delta over its canonical layer
//! - [`encode`] / [`decode`] - text or binary persistence

mod path;
mod value;
mod layer;
mod compose;
mod encoding;

pub use path::*;
pub use value::*;
pub use layer::*;
pub use compose::compose;
pub use encoding::*;
