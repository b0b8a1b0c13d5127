//! Error types shared by every codec in this crate

use thiserror::Error;

/// Errors raised while decoding or encoding packages, meshes and textures
#[derive(Debug, Error)]
pub enum FormatError {
    /// A fixed tag did not match the expected bytes
    #[error("bad magic: expected {expected:02X?}, got {found:02X?}")]
    BadMagic {
        /// Tag the format requires
        expected: [u8; 4],
        /// Tag found in the input
        found: [u8; 4],
    },

    /// A version or sub-format value this crate cannot decode
    #[error("unsupported {what} version: 0x{value:08X}")]
    UnsupportedVersion {
        /// Which structure carried the version
        what: &'static str,
        /// Raw version value
        value: u32,
    },

    /// A read went past the end of the buffer
    #[error("read of {requested} bytes at offset {offset} exceeds buffer ({available} bytes available)")]
    OutOfRange {
        /// Offset the read started at
        offset: usize,
        /// Bytes requested
        requested: usize,
        /// Bytes left after `offset`
        available: usize,
    },

    /// Compressed or run-length data is malformed
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// The compression signature is neither zlib nor RefPack
    #[error("unsupported compression signature: {0:02X?}")]
    UnsupportedCompression([u8; 2]),

    /// A trailing section would run past the anchor that bounds it
    ///
    /// The mesh reader absorbs this and marks the document as degraded.
    #[error("{section} would end at {projected_end}, past the limit at {limit}")]
    StructuralOverflow {
        /// Name of the section being skipped
        section: &'static str,
        /// Offset the section would end at
        projected_end: usize,
        /// Offset it must stay below
        limit: usize,
    },

    /// A document cannot be written as-is
    #[error("validation failed: {0}")]
    Validation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// Name table JSON error
    #[error("name table error: {0}")]
    NameTable(#[from] serde_json::Error),
}

/// Result type for format operations
pub type FormatResult<T> = Result<T, FormatError>;
