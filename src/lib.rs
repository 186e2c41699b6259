//! # Scene Mirror
//!
//! Incremental, time-sampled persistence of a live 3D scene into a
//! hierarchical document store.
//!
//! A render-extraction layer calls into [`writer::SceneWriter`] once per
//! frame for every actor, geometry, material and texture that changed. The
//! writer keeps one structural document per actor, a manifest plus one clip
//! sub-document per time step for every time-varying geometry, and can
//! overlay all of it with mergeable live-edit deltas.
//!
//! ## Modules
//!
//! - [`util`] - Errors, logging handles, content digests
//! - [`document`] - Layered scene documents and their encodings
//! - [`connection`] - Local and remote storage back-ends
//! - [`cache`] - Entity cache records and deterministic naming
//! - [`clips`] - Clip ledgers and actor retiming
//! - [`live`] - Live-edit overlay
//! - [`volume`] - Voxelization and the voxel grid format
//! - [`shading`] - Runtime-selected shading backends
//! - [`config`] - Writer settings
//! - [`writer`] - The scene persistence engine
//!
//! ## Example
//!
//! ```ignore
//! use scene_mirror::prelude::*;
//!
//! let settings = WriterSettings {
//!     output_directory: "/tmp/out".into(),
//!     ..WriterSettings::default()
//! };
//! let mut writer = SceneWriter::new(settings, Logger::tracing_only());
//! writer.connect();
//! writer.create_actor(1, "Heart");
//! writer.update_mesh(1, 7, 0.0, &mesh, None, &[], &[]);
//! writer.flush();
//! ```

pub mod util;
pub mod document;
pub mod connection;
pub mod cache;
pub mod clips;
pub mod live;
pub mod volume;
pub mod shading;
pub mod config;
pub mod writer;

// Re-export commonly used types
pub use util::{Error, Logger, Result, Severity};
pub use writer::SceneWriter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{EntityId, Error, Logger, Result, Severity, TimeCode};
    pub use crate::config::{ProcessLayout, WriterSettings};
    pub use crate::connection::{Connection, ConnectionSettings, LocalConnection, RemoteConnection};
    pub use crate::cache::{GeomAttrs, GeomKind};
    pub use crate::document::{Interpolation, Layer, PrimPath, UpAxis, Value, ValueType};
    pub use crate::shading::{MaterialData, ShadingBackendKind, WrapMode};
    pub use crate::volume::{TransferFunction, VolumeArray, VolumeData};
    pub use crate::writer::*;
}
