//! Voxel grid file format.
//!
//! ```text
//! "SMVG" | version: u32 | flags: u32 | payload
//! ```
//!
//! With `FLAG_COMPRESSED` set the payload is zlib framed (see
//! [`crate::util::compression`]). The payload lists grids; each grid stores
//! its name, value type, transform, background and active leaves. Only
//! active voxel values are stored, in mask order. All integers are
//! little-endian.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::grid::{with_grid, Grid, GridValueType, Leaf, SparseGrid, VoxelValue, LEAF_VOXELS};
use crate::util::compression::{deflate, inflate};
use crate::util::{Error, Result};

pub const GRID_MAGIC: &[u8; 4] = b"SMVG";
pub const GRID_VERSION: u32 = 1;
pub const FLAG_COMPRESSED: u32 = 1;
/// File extension of voxel grid files.
pub const GRID_EXTENSION: &str = "vgrid";

/// The grids stored in one voxel grid file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridFile {
    pub grids: Vec<Grid>,
}

impl GridFile {
    pub fn grid(&self, name: &str) -> Option<&Grid> {
        self.grids.iter().find(|g| g.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.grids.iter().map(Grid::name).collect()
    }
}

fn write_grid<T: VoxelValue, W: Write>(w: &mut W, grid: &SparseGrid<T>) -> std::io::Result<()> {
    let name = grid.name.as_bytes();
    w.write_u32::<LittleEndian>(name.len() as u32)?;
    w.write_all(name)?;
    w.write_u8(T::TYPE as u8)?;
    for v in grid.voxel_size.iter().chain(grid.origin.iter()) {
        w.write_f64::<LittleEndian>(*v)?;
    }
    grid.background.write_to(w)?;

    w.write_u32::<LittleEndian>(grid.leaf_count() as u32)?;
    for leaf in grid.leaves() {
        for c in leaf.origin {
            w.write_i32::<LittleEndian>(c)?;
        }
        for word in leaf.mask {
            w.write_u64::<LittleEndian>(word)?;
        }
        for (i, value) in leaf.values.iter().enumerate() {
            if leaf.is_active(i) {
                value.write_to(w)?;
            }
        }
    }
    Ok(())
}

fn read_body<T: VoxelValue, R: Read>(
    r: &mut R,
    name: String,
    voxel_size: [f64; 3],
    origin: [f64; 3],
) -> Result<SparseGrid<T>> {
    let background = T::read_from(r)?;
    let mut grid = SparseGrid::new(name, background, voxel_size, origin);

    let leaf_count = r.read_u32::<LittleEndian>()?;
    for _ in 0..leaf_count {
        let origin = [
            r.read_i32::<LittleEndian>()?,
            r.read_i32::<LittleEndian>()?,
            r.read_i32::<LittleEndian>()?,
        ];
        let mut leaf = Leaf::new(origin, background);
        for word in leaf.mask.iter_mut() {
            *word = r.read_u64::<LittleEndian>()?;
        }
        for i in 0..LEAF_VOXELS {
            if leaf.is_active(i) {
                leaf.values[i] = T::read_from(r)?;
            }
        }
        grid.insert_leaf(leaf);
    }
    Ok(grid)
}

fn read_grid<R: Read>(r: &mut R) -> Result<Grid> {
    let name_len = r.read_u32::<LittleEndian>()? as usize;
    let mut name = vec![0u8; name_len];
    r.read_exact(&mut name)?;
    let name = String::from_utf8(name)
        .map_err(|_| Error::InvalidGrid("grid name is not UTF-8".into()))?;

    let tag = r.read_u8()?;
    let value_type = GridValueType::from_u8(tag)
        .ok_or_else(|| Error::InvalidGrid(format!("unknown value type {}", tag)))?;

    let mut transform = [0f64; 6];
    for v in transform.iter_mut() {
        *v = r.read_f64::<LittleEndian>()?;
    }
    let voxel_size = [transform[0], transform[1], transform[2]];
    let origin = [transform[3], transform[4], transform[5]];

    Ok(match value_type {
        GridValueType::Float => Grid::Float(read_body(r, name, voxel_size, origin)?),
        GridValueType::Double => Grid::Double(read_body(r, name, voxel_size, origin)?),
        GridValueType::Int32 => Grid::Int32(read_body(r, name, voxel_size, origin)?),
        GridValueType::Int64 => Grid::Int64(read_body(r, name, voxel_size, origin)?),
        GridValueType::Vec3f => Grid::Vec3f(read_body(r, name, voxel_size, origin)?),
        GridValueType::Vec3d => Grid::Vec3d(read_body(r, name, voxel_size, origin)?),
    })
}

/// Serialize grids into the file format.
pub fn write_grids(file: &GridFile, compress: bool) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    payload.write_u32::<LittleEndian>(file.grids.len() as u32)?;
    for grid in &file.grids {
        with_grid!(grid, g => write_grid(&mut payload, g))?;
    }

    let mut out = Vec::with_capacity(12 + payload.len());
    out.extend_from_slice(GRID_MAGIC);
    out.write_u32::<LittleEndian>(GRID_VERSION)?;
    if compress {
        out.write_u32::<LittleEndian>(FLAG_COMPRESSED)?;
        out.extend_from_slice(&deflate(&payload, 6)?);
    } else {
        out.write_u32::<LittleEndian>(0)?;
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

/// Parse a voxel grid file.
pub fn read_grids(data: &[u8]) -> Result<GridFile> {
    if data.len() < 12 || &data[..4] != GRID_MAGIC {
        return Err(Error::InvalidGrid("missing SMVG header".into()));
    }
    let mut header = Cursor::new(&data[4..12]);
    let version = header.read_u32::<LittleEndian>()?;
    if version != GRID_VERSION {
        return Err(Error::InvalidGrid(format!("unsupported version {}", version)));
    }
    let flags = header.read_u32::<LittleEndian>()?;

    let inflated;
    let payload = if flags & FLAG_COMPRESSED != 0 {
        inflated = inflate(&data[12..])?;
        inflated.as_slice()
    } else {
        &data[12..]
    };

    let mut r = Cursor::new(payload);
    let count = r.read_u32::<LittleEndian>()?;
    let mut grids = Vec::with_capacity(count as usize);
    for _ in 0..count {
        grids.push(read_grid(&mut r)?);
    }
    Ok(GridFile { grids })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GridFile {
        let mut density = SparseGrid::new("density", 0.0f32, [0.5; 3], [1.0, 2.0, 3.0]);
        density.set([0, 0, 0], 0.25);
        density.set([17, 3, -4], 1.0);
        let mut diffuse = SparseGrid::new("diffuse", [0.0f32; 3], [0.5; 3], [1.0, 2.0, 3.0]);
        diffuse.set([1, 1, 1], [1.0, 0.5, 0.0]);
        GridFile {
            grids: vec![Grid::Float(density), Grid::Vec3f(diffuse)],
        }
    }

    #[test]
    fn test_compressed_and_plain_agree() {
        let file = sample();
        let plain = write_grids(&file, false).unwrap();
        let packed = write_grids(&file, true).unwrap();
        assert_eq!(read_grids(&plain).unwrap(), file);
        assert_eq!(read_grids(&packed).unwrap(), file);
        assert_eq!(file.names(), vec!["density", "diffuse"]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(read_grids(b"nope"), Err(Error::InvalidGrid(_))));
        let mut data = write_grids(&sample(), false).unwrap();
        data[12] = 9;
        data.truncate(20);
        assert!(read_grids(&data).is_err());
    }
}
