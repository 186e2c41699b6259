//! Dense volume to sparse grid conversion.

use rayon::prelude::*;

use super::element::{ElementType, VolumeArray};
use super::grid::{Grid, SparseGrid};
use super::io::{write_grids, GridFile};
use super::transfer::TransferFunction;
use crate::util::{Error, Logger, Result};

/// Grid names produced for pre-classified volumes.
pub const DENSITY_GRID: &str = "density";
pub const DIFFUSE_GRID: &str = "diffuse";

/// One time step of a dense volume.
#[derive(Clone, Copy, Debug)]
pub struct VolumeData<'a> {
    pub data: VolumeArray<'a>,
    /// Components per voxel, 1 or 3.
    pub components: usize,
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    /// Voxel whose value defines the background; zero when `None`.
    pub background_index: Option<usize>,
    /// Grid name for raw pass-through.
    pub channel: &'a str,
    pub transfer_function: Option<&'a TransferFunction>,
    /// Run values through the transfer function instead of passing them through.
    pub pre_classified: bool,
}

impl VolumeData<'_> {
    /// Number of voxels; `None` when the dimensions overflow.
    pub fn voxel_count(&self) -> Option<usize> {
        self.dims[0].checked_mul(self.dims[1])?.checked_mul(self.dims[2])
    }

    /// Names of the grids the voxelizer produces for this input.
    pub fn grid_names(&self) -> Vec<String> {
        if self.pre_classified {
            vec![DENSITY_GRID.to_string(), DIFFUSE_GRID.to_string()]
        } else {
            vec![self.channel.to_string()]
        }
    }

    fn validate(&self) -> Result<()> {
        if self.components != 1 && self.components != 3 {
            return Err(Error::unsupported(format!(
                "{} components per voxel",
                self.components
            )));
        }
        let too_large = || {
            Error::InvalidGrid(format!(
                "volume {}x{}x{} is too large",
                self.dims[0], self.dims[1], self.dims[2]
            ))
        };
        let voxels = self.voxel_count().ok_or_else(too_large)?;
        let expected = voxels.checked_mul(self.components).ok_or_else(too_large)?;
        if self.data.len() != expected {
            return Err(Error::InvalidGrid(format!(
                "volume {}x{}x{} with {} components needs {} values, got {}",
                self.dims[0],
                self.dims[1],
                self.dims[2],
                self.components,
                expected,
                self.data.len()
            )));
        }
        if let Some(bg) = self.background_index {
            if bg >= voxels {
                return Err(Error::InvalidGrid(format!("background index {} out of range", bg)));
            }
        }
        Ok(())
    }
}

/// Builds sparse grid files from dense volume arrays.
#[derive(Clone, Debug)]
pub struct Voxelizer {
    logger: Logger,
    compress: bool,
}

impl Voxelizer {
    pub fn new(logger: Logger, compress: bool) -> Self {
        Self { logger, compress }
    }

    /// Convert one volume time step into grids.
    pub fn voxelize(&self, volume: &VolumeData) -> Result<GridFile> {
        volume.validate()?;
        let grids = if volume.pre_classified {
            let tf = volume.transfer_function.ok_or_else(|| {
                Error::other("pre-classified volume without a transfer function")
            })?;
            if volume.components != 1 {
                return Err(Error::unsupported(
                    "pre-classification of multi-component volumes",
                ));
            }
            classify(volume, tf)
        } else {
            vec![pass_through(volume)]
        };
        Ok(GridFile { grids })
    }

    /// Voxelize and serialize; failures are logged and yield `None`.
    pub fn grid_file_bytes(&self, volume: &VolumeData) -> Option<Vec<u8>> {
        let result = self
            .voxelize(volume)
            .and_then(|file| write_grids(&file, self.compress));
        match result {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.logger.error(format!(
                    "cannot voxelize volume '{}' ({}): {}",
                    volume.channel,
                    volume.data.element_type(),
                    e
                ));
                None
            }
        }
    }
}

/// Run every voxel through the transfer function. Produces an opacity
/// grid and a color grid.
fn classify(volume: &VolumeData, tf: &TransferFunction) -> Vec<Grid> {
    let data = volume.data;
    let classified: Vec<([f32; 3], f32)> = (0..volume.data.len())
        .into_par_iter()
        .map(|i| tf.classify(data.get_f64(i)))
        .collect();

    let (bg_color, bg_opacity) = match volume.background_index {
        Some(i) => classified[i],
        None => ([0.0; 3], 0.0),
    };

    let density = SparseGrid::from_dense(
        DENSITY_GRID,
        volume.dims,
        bg_opacity,
        volume.spacing,
        volume.origin,
        |i| classified[i].1,
    );
    let diffuse = SparseGrid::from_dense(
        DIFFUSE_GRID,
        volume.dims,
        bg_color,
        volume.spacing,
        volume.origin,
        |i| classified[i].0,
    );
    vec![Grid::Float(density), Grid::Vec3f(diffuse)]
}

/// Store values without classification. The grid type follows the element
/// type: small integers are normalized floats, 32-bit unsigned widens to
/// 64-bit and 64-bit unsigned saturates into signed 64-bit.
fn pass_through(volume: &VolumeData) -> Grid {
    let data = volume.data;
    let name = volume.channel;
    let dims = volume.dims;
    let (spacing, origin) = (volume.spacing, volume.origin);
    let ty = data.element_type();

    if volume.components == 3 {
        let bg = volume.background_index;
        return if ty == ElementType::Float64 {
            let value = |i: usize| [data.get_f64(3 * i), data.get_f64(3 * i + 1), data.get_f64(3 * i + 2)];
            let background = bg.map(&value).unwrap_or_default();
            Grid::Vec3d(SparseGrid::from_dense(name, dims, background, spacing, origin, value))
        } else {
            let scalar = |j: usize| {
                if ty.is_small_integer() {
                    data.get_normalized(j)
                } else {
                    data.get_f64(j) as f32
                }
            };
            let value = |i: usize| [scalar(3 * i), scalar(3 * i + 1), scalar(3 * i + 2)];
            let background = bg.map(&value).unwrap_or_default();
            Grid::Vec3f(SparseGrid::from_dense(name, dims, background, spacing, origin, value))
        };
    }

    macro_rules! scalar_grid {
        ($variant:ident, $get:expr) => {{
            let get = $get;
            let background = volume.background_index.map(&get).unwrap_or_default();
            Grid::$variant(SparseGrid::from_dense(name, dims, background, spacing, origin, get))
        }};
    }

    match ty {
        ElementType::Uint8 | ElementType::Int8 | ElementType::Uint16 | ElementType::Int16 => {
            scalar_grid!(Float, |i: usize| data.get_normalized(i))
        }
        ElementType::Float16 | ElementType::Float32 => {
            scalar_grid!(Float, |i: usize| data.get_f64(i) as f32)
        }
        ElementType::Float64 => scalar_grid!(Double, |i: usize| data.get_f64(i)),
        ElementType::Int32 => scalar_grid!(Int32, |i: usize| data.get_i64(i) as i32),
        ElementType::Uint32 | ElementType::Int64 | ElementType::Uint64 => {
            scalar_grid!(Int64, |i: usize| data.get_i64(i))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{MemorySink, Severity};

    fn volume<'a>(data: VolumeArray<'a>, dims: [usize; 3]) -> VolumeData<'a> {
        VolumeData {
            data,
            components: 1,
            dims,
            spacing: [1.0; 3],
            origin: [0.0; 3],
            background_index: None,
            channel: "field",
            transfer_function: None,
            pre_classified: false,
        }
    }

    #[test]
    fn test_pass_through_types() {
        let vox = Voxelizer::new(Logger::tracing_only(), false);

        let bytes = [0u8, 255];
        let file = vox.voxelize(&volume(VolumeArray::Uint8(&bytes), [2, 1, 1])).unwrap();
        match &file.grids[0] {
            Grid::Float(g) => assert!((g.get([1, 0, 0]) - 1.0).abs() < 1e-6),
            other => panic!("unexpected grid {:?}", other.value_type()),
        }

        let words = [1u32, u32::MAX];
        let file = vox.voxelize(&volume(VolumeArray::Uint32(&words), [2, 1, 1])).unwrap();
        match &file.grids[0] {
            Grid::Int64(g) => assert_eq!(g.get([1, 0, 0]), u32::MAX as i64),
            other => panic!("unexpected grid {:?}", other.value_type()),
        }

        let doubles = [0.5f64, 2.0];
        let file = vox.voxelize(&volume(VolumeArray::Float64(&doubles), [1, 2, 1])).unwrap();
        assert!(matches!(&file.grids[0], Grid::Double(g) if g.get([0, 1, 0]) == 2.0));
    }

    #[test]
    fn test_vector_volume() {
        let vox = Voxelizer::new(Logger::tracing_only(), false);
        let data = [1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0];
        let mut v = volume(VolumeArray::Float32(&data), [2, 1, 1]);
        v.components = 3;
        let file = vox.voxelize(&v).unwrap();
        match &file.grids[0] {
            Grid::Vec3f(g) => {
                assert_eq!(g.get([0, 0, 0]), [1.0, 2.0, 3.0]);
                assert_eq!(g.active_voxel_count(), 1);
            }
            other => panic!("unexpected grid {:?}", other.value_type()),
        }
    }

    #[test]
    fn test_overflowing_dims_are_rejected() {
        let vox = Voxelizer::new(Logger::tracing_only(), false);
        let data = [0.0f32; 8];
        let v = volume(VolumeArray::Float32(&data), [usize::MAX, 2, 4]);
        assert!(v.voxel_count().is_none());
        assert!(matches!(vox.voxelize(&v), Err(Error::InvalidGrid(_))));
    }

    #[test]
    fn test_background_index() {
        let vox = Voxelizer::new(Logger::tracing_only(), false);
        let data = [7i32, 7, 7, 1];
        let mut v = volume(VolumeArray::Int32(&data), [4, 1, 1]);
        v.background_index = Some(0);
        let file = vox.voxelize(&v).unwrap();
        assert_eq!(file.grids[0].active_voxel_count(), 1);
    }

    #[test]
    fn test_classification_uses_transfer_function() {
        let vox = Voxelizer::new(Logger::tracing_only(), false);
        let tf = TransferFunction {
            value_range: [0.0, 255.0],
            colors: vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            opacities: vec![0.0, 0.3, 0.9],
        };
        let data = [0u8, 255];
        let mut v = volume(VolumeArray::Uint8(&data), [2, 1, 1]);
        v.pre_classified = true;
        v.transfer_function = Some(&tf);

        let file = vox.voxelize(&v).unwrap();
        match file.grid(DENSITY_GRID) {
            Some(Grid::Float(g)) => {
                assert!((g.get([1, 0, 0]) - 0.9).abs() < 1e-6);
                assert_eq!(g.get([0, 0, 0]), 0.0);
            }
            _ => panic!("missing density grid"),
        }
        assert!(matches!(file.grid(DIFFUSE_GRID), Some(Grid::Vec3f(_))));
    }

    #[test]
    fn test_unsupported_components_logged() {
        let sink = MemorySink::new();
        let vox = Voxelizer::new(sink.logger(), true);
        let data = [0.0f32; 4];
        let mut v = volume(VolumeArray::Float32(&data), [2, 1, 1]);
        v.components = 2;
        assert!(vox.grid_file_bytes(&v).is_none());
        assert_eq!(sink.count(Severity::Error), 1);
    }
}
