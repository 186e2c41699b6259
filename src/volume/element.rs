//! Numeric element types accepted by the voxelizer.

use half::f16;
use std::fmt;

/// Element type of a dense volume array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementType {
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Signed 8-bit integer
    Int8 = 2,
    /// Unsigned 16-bit integer
    Uint16 = 3,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Unsigned 32-bit integer
    Uint32 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Unsigned 64-bit integer
    Uint64 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16 = 9,
    /// 32-bit floating point
    Float32 = 10,
    /// 64-bit floating point
    Float64 = 11,
}

impl ElementType {
    /// Size in bytes of one element.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// 8 and 16-bit integers, which are normalized to [0, 1] on pass-through.
    #[inline]
    pub const fn is_small_integer(self) -> bool {
        matches!(self, Self::Uint8 | Self::Int8 | Self::Uint16 | Self::Int16)
    }

    /// Value range of the type, used for normalization of small integers.
    pub fn value_range(self) -> (f64, f64) {
        match self {
            Self::Uint8 => (u8::MIN as f64, u8::MAX as f64),
            Self::Int8 => (i8::MIN as f64, i8::MAX as f64),
            Self::Uint16 => (u16::MIN as f64, u16::MAX as f64),
            Self::Int16 => (i16::MIN as f64, i16::MAX as f64),
            Self::Uint32 => (u32::MIN as f64, u32::MAX as f64),
            Self::Int32 => (i32::MIN as f64, i32::MAX as f64),
            Self::Uint64 => (u64::MIN as f64, u64::MAX as f64),
            Self::Int64 => (i64::MIN as f64, i64::MAX as f64),
            Self::Float16 => (f16::MIN.to_f64(), f16::MAX.to_f64()),
            Self::Float32 => (f32::MIN as f64, f32::MAX as f64),
            Self::Float64 => (f64::MIN, f64::MAX),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Borrowed dense array of one of the supported element types.
#[derive(Clone, Copy, Debug)]
pub enum VolumeArray<'a> {
    Uint8(&'a [u8]),
    Int8(&'a [i8]),
    Uint16(&'a [u16]),
    Int16(&'a [i16]),
    Uint32(&'a [u32]),
    Int32(&'a [i32]),
    Uint64(&'a [u64]),
    Int64(&'a [i64]),
    Float16(&'a [f16]),
    Float32(&'a [f32]),
    Float64(&'a [f64]),
}

impl VolumeArray<'_> {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Uint8(_) => ElementType::Uint8,
            Self::Int8(_) => ElementType::Int8,
            Self::Uint16(_) => ElementType::Uint16,
            Self::Int16(_) => ElementType::Int16,
            Self::Uint32(_) => ElementType::Uint32,
            Self::Int32(_) => ElementType::Int32,
            Self::Uint64(_) => ElementType::Uint64,
            Self::Int64(_) => ElementType::Int64,
            Self::Float16(_) => ElementType::Float16,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Uint8(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::Uint16(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Uint32(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Uint64(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float16(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i` widened to f64.
    #[inline]
    pub fn get_f64(&self, i: usize) -> f64 {
        match self {
            Self::Uint8(v) => v[i] as f64,
            Self::Int8(v) => v[i] as f64,
            Self::Uint16(v) => v[i] as f64,
            Self::Int16(v) => v[i] as f64,
            Self::Uint32(v) => v[i] as f64,
            Self::Int32(v) => v[i] as f64,
            Self::Uint64(v) => v[i] as f64,
            Self::Int64(v) => v[i] as f64,
            Self::Float16(v) => v[i].to_f64(),
            Self::Float32(v) => v[i] as f64,
            Self::Float64(v) => v[i],
        }
    }

    /// Element `i` as a 64-bit integer; unsigned 64-bit values saturate.
    #[inline]
    pub fn get_i64(&self, i: usize) -> i64 {
        match self {
            Self::Uint8(v) => v[i] as i64,
            Self::Int8(v) => v[i] as i64,
            Self::Uint16(v) => v[i] as i64,
            Self::Int16(v) => v[i] as i64,
            Self::Uint32(v) => v[i] as i64,
            Self::Int32(v) => v[i] as i64,
            Self::Uint64(v) => i64::try_from(v[i]).unwrap_or(i64::MAX),
            Self::Int64(v) => v[i],
            Self::Float16(v) => v[i].to_f64() as i64,
            Self::Float32(v) => v[i] as i64,
            Self::Float64(v) => v[i] as i64,
        }
    }

    /// Element `i` mapped to [0, 1] using the element type's value range.
    #[inline]
    pub fn get_normalized(&self, i: usize) -> f32 {
        let (lo, hi) = self.element_type().value_range();
        ((self.get_f64(i) - lo) / (hi - lo)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(ElementType::Uint8.num_bytes(), 1);
        assert_eq!(ElementType::Float16.num_bytes(), 2);
        assert_eq!(ElementType::Int32.num_bytes(), 4);
        assert_eq!(ElementType::Float64.num_bytes(), 8);
    }

    #[test]
    fn test_normalized_small_integers() {
        let data = [0u8, 128, 255];
        let arr = VolumeArray::Uint8(&data);
        assert_eq!(arr.get_normalized(0), 0.0);
        assert!((arr.get_normalized(2) - 1.0).abs() < 1e-6);

        let data = [i16::MIN, 0, i16::MAX];
        let arr = VolumeArray::Int16(&data);
        assert_eq!(arr.get_normalized(0), 0.0);
        assert!((arr.get_normalized(1) - 0.5).abs() < 1e-4);
        assert!((arr.get_normalized(2) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_u64_saturates() {
        let data = [u64::MAX, 5];
        let arr = VolumeArray::Uint64(&data);
        assert_eq!(arr.get_i64(0), i64::MAX);
        assert_eq!(arr.get_i64(1), 5);
    }

    #[test]
    fn test_half_widening() {
        let data = [f16::from_f32(0.5)];
        assert_eq!(VolumeArray::Float16(&data).get_f64(0), 0.5);
    }
}
