//! Volume voxelization.
//!
//! Dense per-time-step volume arrays become sparse grid files:
//!
//! - [`VolumeArray`] / [`ElementType`] - Typed dense input
//! - [`TransferFunction`] - Color and opacity classification
//! - [`SparseGrid`] / [`Grid`] - 8x8x8 leaf sparse grids
//! - [`write_grids`] / [`read_grids`] - Grid file format
//! - [`Voxelizer`] - Dense to sparse conversion

mod element;
mod grid;
mod io;
mod transfer;
mod voxelize;

pub use element::*;
pub use grid::{Grid, GridValueType, Leaf, SparseGrid, VoxelValue, LEAF_DIM, LEAF_VOXELS};
pub use io::*;
pub use transfer::*;
pub use voxelize::*;
