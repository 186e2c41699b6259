//! zlib helpers shared by binary documents and voxel grids.
//!
//! Compressed payloads carry an 8-byte little-endian uncompressed size in
//! front of the zlib stream so readers can size their buffer up front.

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Largest payload we agree to inflate (4 GiB).
const MAX_INFLATED_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Map a 0-9 level onto a flate2 compression setting.
fn level_to_compression(level: u32) -> Compression {
    match level {
        0 => Compression::none(),
        1 => Compression::fast(),
        2..=5 => Compression::default(),
        _ => Compression::best(),
    }
}

/// Compress `data` with zlib, prefixing the uncompressed size.
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + data.len() / 2);
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());

    let mut encoder = ZlibEncoder::new(out, level_to_compression(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`deflate`].
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 8 {
        return Err(Error::invalid("compressed payload shorter than its size header"));
    }

    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&data[..8]);
    let expected = u64::from_le_bytes(size_bytes);
    if expected > MAX_INFLATED_SIZE {
        return Err(Error::invalid(format!("implausible inflated size {}", expected)));
    }

    let mut decoder = ZlibDecoder::new(&data[8..]);
    let mut out = Vec::with_capacity(expected as usize);
    decoder.read_to_end(&mut out)?;

    if out.len() as u64 != expected {
        return Err(Error::invalid(format!(
            "inflated {} bytes, header promised {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_shrinks_repetitive_data() {
        let original = b"positions positions positions ".repeat(200);
        let packed = deflate(&original, 6).unwrap();
        assert!(packed.len() < original.len());
        assert_eq!(inflate(&packed).unwrap(), original);
    }

    #[test]
    fn test_empty_payload() {
        let packed = deflate(&[], 9).unwrap();
        assert!(inflate(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_header_is_rejected() {
        assert!(inflate(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let mut packed = deflate(b"hello world", 6).unwrap();
        packed[0] = packed[0].wrapping_add(1);
        assert!(inflate(&packed).is_err());
    }
}
