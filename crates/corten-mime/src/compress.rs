//! Gzip part compression.

use crate::error::MimeError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress one part's content.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, MimeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress one part's content, refusing to expand past `max_bytes`.
///
/// Every failure here is a [`MimeError::Decompression`]: the input is an
/// in-memory slice, so a read error can only mean the gzip stream itself is
/// bad, and an output past the bound means the part does not decompress
/// within policy. Neither is a generic I/O fault.
pub fn gunzip(data: &[u8], max_bytes: u64) -> Result<Vec<u8>, MimeError> {
    let mut decoder = GzDecoder::new(data).take(max_bytes.saturating_add(1));
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MimeError::Decompression(e.to_string()))?;
    if out.len() as u64 > max_bytes {
        return Err(MimeError::Decompression(format!(
            "decompressed size exceeds {max_bytes} bytes"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"<Invoice>the same ten bytes over and over and over</Invoice>".repeat(50);
        let packed = gzip(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(gunzip(&packed, 1 << 20).unwrap(), data);
    }

    #[test]
    fn corrupt_stream_is_a_decompression_failure() {
        let err = gunzip(b"this is not gzip data", 1 << 20).unwrap_err();
        assert!(err.is_decompression(), "got {err:?}");
    }

    #[test]
    fn truncated_stream_is_a_decompression_failure() {
        let packed = gzip(b"some payload bytes worth compressing").unwrap();
        let err = gunzip(&packed[..packed.len() / 2], 1 << 20).unwrap_err();
        assert!(err.is_decompression(), "got {err:?}");
    }

    #[test]
    fn expansion_bound_enforced() {
        let data = vec![0u8; 64 * 1024];
        let packed = gzip(&data).unwrap();
        let err = gunzip(&packed, 1024).unwrap_err();
        assert!(err.is_decompression(), "got {err:?}");
        assert!(err.to_string().contains("1024"));
    }
}
