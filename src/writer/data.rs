//! Per-call input bundles.
//!
//! Buffers are borrowed from the caller for the duration of one update call.
//! Optional attributes left as `None` author the "no value" sentinel once
//! they have been written before.

use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Luma, LumaA, Rgb, Rgba};

use crate::cache::GeomAttrs;
use crate::document::{Interpolation, Value};
use crate::shading::WrapMode;
use crate::util::{ContentKey, Error, Result};
use crate::volume::VolumeData;

/// Typed slice of a generic array.
#[derive(Clone, Copy, Debug)]
pub enum ArrayInput<'a> {
    U8(&'a [u8]),
    I32(&'a [i32]),
    U32(&'a [u32]),
    I64(&'a [i64]),
    U64(&'a [u64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
    Vec2f(&'a [[f32; 2]]),
    Vec3f(&'a [[f32; 3]]),
    Vec3d(&'a [[f64; 3]]),
    Vec4f(&'a [[f32; 4]]),
}

impl ArrayInput<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Vec2f(v) => v.len(),
            Self::Vec3f(v) => v.len(),
            Self::Vec3d(v) => v.len(),
            Self::Vec4f(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "uint8",
            Self::I32(_) => "int32",
            Self::U32(_) => "uint32",
            Self::I64(_) => "int64",
            Self::U64(_) => "uint64",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
            Self::Vec2f(_) => "float32x2",
            Self::Vec3f(_) => "float32x3",
            Self::Vec3d(_) => "float64x3",
            Self::Vec4f(_) => "float32x4",
        }
    }

    /// Content identity, including the element type.
    pub fn content_key(&self) -> ContentKey {
        let key = match self {
            Self::U8(v) => ContentKey::from_pod(v),
            Self::I32(v) => ContentKey::from_pod(v),
            Self::U32(v) => ContentKey::from_pod(v),
            Self::I64(v) => ContentKey::from_pod(v),
            Self::U64(v) => ContentKey::from_pod(v),
            Self::F32(v) => ContentKey::from_pod(v),
            Self::F64(v) => ContentKey::from_pod(v),
            Self::Vec2f(v) => ContentKey::from_pod(v),
            Self::Vec3f(v) => ContentKey::from_pod(v),
            Self::Vec3d(v) => ContentKey::from_pod(v),
            Self::Vec4f(v) => ContentKey::from_pod(v),
        };
        key.chain(self.type_name().as_bytes())
    }

    /// Document value for this array.
    ///
    /// Bytes widen to `int[]` and `uint32` to `int64[]`; `uint64` has no
    /// lossless target and is rejected.
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Self::U8(v) => Value::IntArray(v.iter().map(|&x| x as i32).collect()),
            Self::I32(v) => Value::IntArray(v.to_vec()),
            Self::U32(v) => Value::Int64Array(v.iter().map(|&x| x as i64).collect()),
            Self::I64(v) => Value::Int64Array(v.to_vec()),
            Self::U64(_) => {
                return Err(Error::unsupported("uint64 generic arrays"));
            }
            Self::F32(v) => Value::FloatArray(v.to_vec()),
            Self::F64(v) => Value::DoubleArray(v.to_vec()),
            Self::Vec2f(v) => Value::Float2Array(v.to_vec()),
            Self::Vec3f(v) => Value::Float3Array(v.to_vec()),
            Self::Vec3d(v) => Value::Double3Array(v.to_vec()),
            Self::Vec4f(v) => Value::Float4Array(v.to_vec()),
        };
        Ok(value)
    }
}

/// Arbitrary named per-element array, written as `primvars:<name>`.
#[derive(Clone, Copy, Debug)]
pub struct GenericArray<'a> {
    pub name: &'a str,
    pub data: ArrayInput<'a>,
    pub interpolation: Interpolation,
    pub time_varying: bool,
}

/// Prototype shapes of an instancer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceShape {
    Sphere,
    Cylinder,
    Cone,
    Cube,
    Arrow,
}

impl InstanceShape {
    /// Prim name under the prototypes scope.
    pub fn prim_name(self) -> &'static str {
        match self {
            Self::Sphere => "Sphere",
            Self::Cylinder => "Cylinder",
            Self::Cone => "Cone",
            Self::Cube => "Cube",
            Self::Arrow => "Arrow",
        }
    }
}

/// One mesh time step.
#[derive(Clone, Copy, Debug)]
pub struct MeshData<'a> {
    pub points: &'a [[f32; 3]],
    pub face_vertex_indices: &'a [i32],
    /// `None` for a pure triangle mesh.
    pub face_vertex_counts: Option<&'a [i32]>,
    pub normals: Option<&'a [[f32; 3]]>,
    pub normals_interpolation: Interpolation,
    pub tex_coords: Option<&'a [[f32; 2]]>,
    pub tex_coords_interpolation: Interpolation,
    pub colors: Option<&'a [[f32; 3]]>,
    pub colors_interpolation: Interpolation,
    /// Attributes written per time step rather than once.
    pub time_varying: GeomAttrs,
}

impl Default for MeshData<'_> {
    fn default() -> Self {
        Self {
            points: &[],
            face_vertex_indices: &[],
            face_vertex_counts: None,
            normals: None,
            normals_interpolation: Interpolation::Vertex,
            tex_coords: None,
            tex_coords_interpolation: Interpolation::Vertex,
            colors: None,
            colors_interpolation: Interpolation::Vertex,
            time_varying: GeomAttrs::empty(),
        }
    }
}

/// One curve-set time step (linear curves).
#[derive(Clone, Copy, Debug)]
pub struct CurveData<'a> {
    pub points: &'a [[f32; 3]],
    pub curve_vertex_counts: &'a [i32],
    pub widths: Option<&'a [f32]>,
    pub widths_interpolation: Interpolation,
    pub colors: Option<&'a [[f32; 3]]>,
    pub colors_interpolation: Interpolation,
    pub tex_coords: Option<&'a [[f32; 2]]>,
    pub time_varying: GeomAttrs,
}

impl Default for CurveData<'_> {
    fn default() -> Self {
        Self {
            points: &[],
            curve_vertex_counts: &[],
            widths: None,
            widths_interpolation: Interpolation::Vertex,
            colors: None,
            colors_interpolation: Interpolation::Vertex,
            tex_coords: None,
            time_varying: GeomAttrs::empty(),
        }
    }
}

/// One point-instancer time step.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstancerData<'a> {
    pub positions: &'a [[f32; 3]],
    pub scales: Option<&'a [[f32; 3]]>,
    /// Quaternions as `[x, y, z, w]`; normalized on write.
    pub orientations: Option<&'a [[f32; 4]]>,
    /// Prototype index per instance; all zero when `None`.
    pub proto_indices: Option<&'a [i32]>,
    pub colors: Option<&'a [[f32; 3]]>,
    pub velocities: Option<&'a [[f32; 3]]>,
    pub invisible_ids: Option<&'a [i64]>,
    pub instance_ids: Option<&'a [i64]>,
    pub shapes: &'a [InstanceShape],
    pub time_varying: GeomAttrs,
}

impl InstancerData<'_> {
    /// A lone sphere prototype is written as a point set.
    pub fn uses_points_representation(&self) -> bool {
        self.shapes == [InstanceShape::Sphere]
    }
}

/// One volume time step.
#[derive(Clone, Copy, Debug)]
pub struct VolumeInput<'a> {
    pub data: VolumeData<'a>,
    /// Write a grid file per time step instead of a single static one.
    pub time_varying: bool,
}

/// Pixel storage of a texture.
#[derive(Clone, Copy, Debug)]
pub enum TexturePixels<'a> {
    U8(&'a [u8]),
    /// Linear floats, quantized to 8 bits on encode.
    F32(&'a [f32]),
}

/// One texture image.
#[derive(Clone, Copy, Debug)]
pub struct TextureData<'a> {
    pub width: u32,
    pub height: u32,
    /// 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub pixels: TexturePixels<'a>,
    pub wrap: [WrapMode; 2],
    pub time_varying: bool,
}

impl TextureData<'_> {
    fn bytes(&self) -> Vec<u8> {
        match self.pixels {
            TexturePixels::U8(p) => p.to_vec(),
            TexturePixels::F32(p) => p
                .iter()
                .map(|&v| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
                .collect(),
        }
    }

    /// Encode as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        let raw = self.bytes();
        if raw.len() != expected {
            return Err(Error::other(format!(
                "texture {}x{}x{} needs {} values, got {}",
                self.width,
                self.height,
                self.channels,
                expected,
                raw.len()
            )));
        }

        let mut out = Cursor::new(Vec::new());
        let (w, h) = (self.width, self.height);
        let mismatch = || Error::other("texture buffer does not match its dimensions");
        match self.channels {
            1 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, raw)
                .ok_or_else(mismatch)?
                .write_to(&mut out, ImageFormat::Png)?,
            2 => ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, raw)
                .ok_or_else(mismatch)?
                .write_to(&mut out, ImageFormat::Png)?,
            3 => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, raw)
                .ok_or_else(mismatch)?
                .write_to(&mut out, ImageFormat::Png)?,
            4 => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, raw)
                .ok_or_else(mismatch)?
                .write_to(&mut out, ImageFormat::Png)?,
            n => return Err(Error::unsupported(format!("{} texture channels", n))),
        }
        Ok(out.into_inner())
    }
}
