//! Resource payload decompression
//!
//! Package payloads are compressed with one of two schemes, told apart by a
//! two-byte sniff of the payload:
//!
//! - `78 xx`: a zlib-wrapped DEFLATE stream
//! - `xx FB`: RefPack, a legacy LZ77 variant (see [`refpack`])
//!
//! Everything else is rejected with [`FormatError::UnsupportedCompression`].

pub mod refpack;

use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::io::Read;

use crate::error::{FormatError, FormatResult};

/// Maximum allowed decompression size (1 GB)
///
/// Limits the output of a single payload so that a corrupt size field
/// cannot request an arbitrarily large allocation.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Compression indicator written to the index for zlib payloads
pub const ZLIB_COMPRESSION_FLAG: u16 = 0x5A42;

/// First byte of a zlib stream
pub const ZLIB_SIGNATURE: u8 = 0x78;

/// Second byte of a RefPack stream
pub const REFPACK_SIGNATURE: u8 = 0xFB;

/// Compression scheme detected from a payload's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// zlib-wrapped DEFLATE
    Zlib,
    /// RefPack
    RefPack,
}

impl CompressionKind {
    /// Sniff the scheme from the first two bytes
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data {
            [ZLIB_SIGNATURE, ..] => Some(Self::Zlib),
            [_, REFPACK_SIGNATURE, ..] => Some(Self::RefPack),
            _ => None,
        }
    }
}

/// Decompress a payload to `expected_size` bytes
pub fn decompress(data: &[u8], expected_size: usize) -> FormatResult<Vec<u8>> {
    match CompressionKind::detect(data) {
        Some(CompressionKind::Zlib) => decompress_zlib(data, expected_size),
        Some(CompressionKind::RefPack) => refpack::decompress(data, expected_size),
        None => {
            let mut signature = [0u8; 2];
            let len = data.len().min(2);
            signature[..len].copy_from_slice(&data[..len]);
            Err(FormatError::UnsupportedCompression(signature))
        }
    }
}

/// Inflate a zlib stream that must produce exactly `expected_size` bytes
pub fn decompress_zlib(data: &[u8], expected_size: usize) -> FormatResult<Vec<u8>> {
    if expected_size > MAX_DECOMPRESSION_SIZE {
        return Err(FormatError::CorruptStream(format!(
            "expected size {expected_size} exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
        )));
    }

    // One byte of headroom so an oversized stream shows up as a mismatch
    let mut decoder = ZlibDecoder::new(data).take(expected_size as u64 + 1);
    let mut decompressed = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| FormatError::CorruptStream(format!("zlib decompression failed: {e}")))?;

    if decompressed.len() != expected_size {
        return Err(FormatError::CorruptStream(format!(
            "zlib size mismatch: expected {expected_size}, got {}",
            decompressed.len()
        )));
    }

    Ok(decompressed)
}

/// Compress data as a zlib stream
pub fn compress_zlib(data: &[u8]) -> FormatResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(data, Compression::default());
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed)?;
    Ok(compressed)
}
