//! Content keys for skipping unchanged writes.
//!
//! Static attribute values are only rewritten when their content key changes.

use md5::{Digest, Md5};

/// 128-bit digest of an attribute payload.
pub type SampleDigest = [u8; 16];

/// Compute the MD5 digest of `data`.
#[inline]
pub fn compute_digest(data: &[u8]) -> SampleDigest {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Content-based key: digest plus byte length.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct ContentKey {
    pub digest: SampleDigest,
    pub size: usize,
}

impl ContentKey {
    /// Key for a raw byte payload.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            digest: compute_digest(data),
            size: data.len(),
        }
    }

    /// Key for a slice of plain-old-data elements.
    pub fn from_pod<T: bytemuck::Pod>(data: &[T]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(data))
    }

    /// Fold another key into this one, e.g. to include interpolation or a
    /// type tag in the identity of a value.
    pub fn chain(&self, extra: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(self.digest);
        hasher.update(extra);
        Self {
            digest: hasher.finalize().into(),
            size: self.size,
        }
    }
}
