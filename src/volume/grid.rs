//! Sparse voxel grids.
//!
//! Voxels are grouped into 8x8x8 leaves keyed by their minimum corner. A
//! leaf exists only if at least one of its voxels differs from the grid's
//! background value; inactive voxels read back as the background.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;

/// Edge length of a leaf in voxels.
pub const LEAF_DIM: usize = 8;
/// Voxels per leaf.
pub const LEAF_VOXELS: usize = LEAF_DIM * LEAF_DIM * LEAF_DIM;
const MASK_WORDS: usize = LEAF_VOXELS / 64;

/// Voxel value type tag, stored in grid files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GridValueType {
    Float = 1,
    Double = 2,
    Int32 = 3,
    Int64 = 4,
    Vec3f = 5,
    Vec3d = 6,
}

impl GridValueType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => Self::Float,
            2 => Self::Double,
            3 => Self::Int32,
            4 => Self::Int64,
            5 => Self::Vec3f,
            6 => Self::Vec3d,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Double => "double",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Vec3f => "vec3f",
            Self::Vec3d => "vec3d",
        }
    }
}

/// Value stored in a voxel.
pub trait VoxelValue: Copy + PartialEq + Default + Send + Sync + 'static {
    const TYPE: GridValueType;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()>;
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self>;
}

impl VoxelValue for f32 {
    const TYPE: GridValueType = GridValueType::Float;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_f32::<LittleEndian>(*self)
    }
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_f32::<LittleEndian>()
    }
}

impl VoxelValue for f64 {
    const TYPE: GridValueType = GridValueType::Double;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_f64::<LittleEndian>(*self)
    }
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_f64::<LittleEndian>()
    }
}

impl VoxelValue for i32 {
    const TYPE: GridValueType = GridValueType::Int32;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_i32::<LittleEndian>(*self)
    }
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_i32::<LittleEndian>()
    }
}

impl VoxelValue for i64 {
    const TYPE: GridValueType = GridValueType::Int64;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_i64::<LittleEndian>(*self)
    }
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        r.read_i64::<LittleEndian>()
    }
}

impl VoxelValue for [f32; 3] {
    const TYPE: GridValueType = GridValueType::Vec3f;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for c in self {
            w.write_f32::<LittleEndian>(*c)?;
        }
        Ok(())
    }
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok([
            r.read_f32::<LittleEndian>()?,
            r.read_f32::<LittleEndian>()?,
            r.read_f32::<LittleEndian>()?,
        ])
    }
}

impl VoxelValue for [f64; 3] {
    const TYPE: GridValueType = GridValueType::Vec3d;
    fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for c in self {
            w.write_f64::<LittleEndian>(*c)?;
        }
        Ok(())
    }
    fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok([
            r.read_f64::<LittleEndian>()?,
            r.read_f64::<LittleEndian>()?,
            r.read_f64::<LittleEndian>()?,
        ])
    }
}

/// One 8x8x8 block of voxels.
#[derive(Clone, Debug, PartialEq)]
pub struct Leaf<T> {
    /// Index-space coordinate of the leaf's minimum corner.
    pub origin: [i32; 3],
    /// Active bit per voxel.
    pub mask: [u64; MASK_WORDS],
    pub values: Vec<T>,
}

impl<T: VoxelValue> Leaf<T> {
    pub fn new(origin: [i32; 3], background: T) -> Self {
        Self {
            origin,
            mask: [0; MASK_WORDS],
            values: vec![background; LEAF_VOXELS],
        }
    }

    #[inline]
    fn offset(local: [usize; 3]) -> usize {
        local[0] + local[1] * LEAF_DIM + local[2] * LEAF_DIM * LEAF_DIM
    }

    #[inline]
    pub fn is_active(&self, offset: usize) -> bool {
        self.mask[offset / 64] & (1u64 << (offset % 64)) != 0
    }

    fn set(&mut self, offset: usize, value: T, active: bool) {
        self.values[offset] = value;
        let bit = 1u64 << (offset % 64);
        if active {
            self.mask[offset / 64] |= bit;
        } else {
            self.mask[offset / 64] &= !bit;
        }
    }

    pub fn active_count(&self) -> usize {
        self.mask.iter().map(|w| w.count_ones() as usize).sum()
    }
}

fn leaf_key(ijk: [i32; 3]) -> ([i32; 3], [usize; 3]) {
    let dim = LEAF_DIM as i32;
    let origin = [
        ijk[0].div_euclid(dim) * dim,
        ijk[1].div_euclid(dim) * dim,
        ijk[2].div_euclid(dim) * dim,
    ];
    let local = [
        (ijk[0] - origin[0]) as usize,
        (ijk[1] - origin[1]) as usize,
        (ijk[2] - origin[2]) as usize,
    ];
    (origin, local)
}

/// Named sparse grid with a uniform index-to-world transform.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseGrid<T> {
    pub name: String,
    pub background: T,
    pub voxel_size: [f64; 3],
    /// World position of voxel (0, 0, 0).
    pub origin: [f64; 3],
    leaves: BTreeMap<[i32; 3], Leaf<T>>,
}

impl<T: VoxelValue> SparseGrid<T> {
    pub fn new(name: impl Into<String>, background: T, voxel_size: [f64; 3], origin: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            background,
            voxel_size,
            origin,
            leaves: BTreeMap::new(),
        }
    }

    /// Build from a dense x-fastest array, skipping background voxels.
    ///
    /// Leaves are filled in parallel.
    pub fn from_dense(
        name: impl Into<String>,
        dims: [usize; 3],
        background: T,
        voxel_size: [f64; 3],
        origin: [f64; 3],
        value_at: impl Fn(usize) -> T + Sync,
    ) -> Self {
        let mut grid = Self::new(name, background, voxel_size, origin);
        let blocks = [
            dims[0].div_ceil(LEAF_DIM),
            dims[1].div_ceil(LEAF_DIM),
            dims[2].div_ceil(LEAF_DIM),
        ];
        let count = blocks[0] * blocks[1] * blocks[2];

        let leaves: Vec<Leaf<T>> = (0..count)
            .into_par_iter()
            .filter_map(|b| {
                let bx = b % blocks[0];
                let by = (b / blocks[0]) % blocks[1];
                let bz = b / (blocks[0] * blocks[1]);
                let base = [bx * LEAF_DIM, by * LEAF_DIM, bz * LEAF_DIM];
                let mut leaf = Leaf::new([base[0] as i32, base[1] as i32, base[2] as i32], background);

                for z in base[2]..(base[2] + LEAF_DIM).min(dims[2]) {
                    for y in base[1]..(base[1] + LEAF_DIM).min(dims[1]) {
                        for x in base[0]..(base[0] + LEAF_DIM).min(dims[0]) {
                            let value = value_at(x + y * dims[0] + z * dims[0] * dims[1]);
                            if value != background {
                                let local = [x - base[0], y - base[1], z - base[2]];
                                leaf.set(Leaf::<T>::offset(local), value, true);
                            }
                        }
                    }
                }
                (leaf.active_count() > 0).then_some(leaf)
            })
            .collect();

        for leaf in leaves {
            grid.leaves.insert(leaf.origin, leaf);
        }
        grid
    }

    /// Value at index coordinate `ijk`.
    pub fn get(&self, ijk: [i32; 3]) -> T {
        let (origin, local) = leaf_key(ijk);
        match self.leaves.get(&origin) {
            Some(leaf) => leaf.values[Leaf::<T>::offset(local)],
            None => self.background,
        }
    }

    pub fn is_active(&self, ijk: [i32; 3]) -> bool {
        let (origin, local) = leaf_key(ijk);
        self.leaves
            .get(&origin)
            .is_some_and(|leaf| leaf.is_active(Leaf::<T>::offset(local)))
    }

    /// Set a voxel. Writing the background value deactivates it.
    pub fn set(&mut self, ijk: [i32; 3], value: T) {
        let (origin, local) = leaf_key(ijk);
        let active = value != self.background;
        if !active && !self.leaves.contains_key(&origin) {
            return;
        }
        let background = self.background;
        let leaf = self
            .leaves
            .entry(origin)
            .or_insert_with(|| Leaf::new(origin, background));
        leaf.set(Leaf::<T>::offset(local), value, active);
        if leaf.active_count() == 0 {
            self.leaves.remove(&origin);
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn active_voxel_count(&self) -> usize {
        self.leaves.values().map(Leaf::active_count).sum()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Leaf<T>> {
        self.leaves.values()
    }

    pub(crate) fn insert_leaf(&mut self, leaf: Leaf<T>) {
        self.leaves.insert(leaf.origin, leaf);
    }
}

/// Grid of any supported value type.
#[derive(Clone, Debug, PartialEq)]
pub enum Grid {
    Float(SparseGrid<f32>),
    Double(SparseGrid<f64>),
    Int32(SparseGrid<i32>),
    Int64(SparseGrid<i64>),
    Vec3f(SparseGrid<[f32; 3]>),
    Vec3d(SparseGrid<[f64; 3]>),
}

macro_rules! with_grid {
    ($grid:expr, $g:ident => $body:expr) => {
        match $grid {
            Grid::Float($g) => $body,
            Grid::Double($g) => $body,
            Grid::Int32($g) => $body,
            Grid::Int64($g) => $body,
            Grid::Vec3f($g) => $body,
            Grid::Vec3d($g) => $body,
        }
    };
}
pub(crate) use with_grid;

impl Grid {
    pub fn name(&self) -> &str {
        with_grid!(self, g => g.name.as_str())
    }

    pub fn value_type(&self) -> GridValueType {
        match self {
            Grid::Float(_) => GridValueType::Float,
            Grid::Double(_) => GridValueType::Double,
            Grid::Int32(_) => GridValueType::Int32,
            Grid::Int64(_) => GridValueType::Int64,
            Grid::Vec3f(_) => GridValueType::Vec3f,
            Grid::Vec3d(_) => GridValueType::Vec3d,
        }
    }

    pub fn active_voxel_count(&self) -> usize {
        with_grid!(self, g => g.active_voxel_count())
    }

    pub fn leaf_count(&self) -> usize {
        with_grid!(self, g => g.leaf_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_background() {
        let mut grid = SparseGrid::new("density", 0.0f32, [1.0; 3], [0.0; 3]);
        assert_eq!(grid.get([3, 4, 5]), 0.0);
        grid.set([3, 4, 5], 2.5);
        grid.set([-1, 0, 0], 1.0);
        assert_eq!(grid.get([3, 4, 5]), 2.5);
        assert_eq!(grid.get([-1, 0, 0]), 1.0);
        assert_eq!(grid.leaf_count(), 2);
        assert_eq!(grid.active_voxel_count(), 2);

        grid.set([3, 4, 5], 0.0);
        assert!(!grid.is_active([3, 4, 5]));
        assert_eq!(grid.leaf_count(), 1);
    }

    #[test]
    fn test_from_dense_skips_background() {
        let dims = [10, 9, 3];
        let n = dims[0] * dims[1] * dims[2];
        let data: Vec<i32> = (0..n).map(|i| if i % 7 == 0 { 3 } else { -1 }).collect();
        let grid = SparseGrid::from_dense("ids", dims, -1, [0.5; 3], [0.0; 3], |i| data[i]);

        let expected = data.iter().filter(|v| **v != -1).count();
        assert_eq!(grid.active_voxel_count(), expected);
        // x = 7 lands in the first leaf, x = 8 in the second
        assert_eq!(grid.get([7, 0, 0]), 3);
        assert_eq!(grid.get([1, 0, 0]), -1);
        assert!(grid.leaf_count() <= 4);
    }
}
