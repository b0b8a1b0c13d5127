//! Package builder
//!
//! Writes the header, the payloads in insertion order and the index. The
//! header's entry count, index position and index size are reserved up front
//! and patched once the index has been emitted.

use tracing::debug;

use super::header::{HEADER_SIZE, INDEX_KIND, PACKAGE_MAGIC, SUPPORTED_MAJOR_VERSION};
use super::index::{PackageIndex, ResourceEntry};
use crate::compression::{ZLIB_COMPRESSION_FLAG, compress_zlib};
use crate::cursor::ByteCursor;
use crate::error::{FormatError, FormatResult};
use crate::tgi::ResourceKey;

/// Compression indicator for stored payloads
const STORED_COMPRESSION_FLAG: u16 = 0x0000;

#[derive(Debug, Clone)]
struct PendingResource {
    key: ResourceKey,
    payload: Vec<u8>,
    mem_size: usize,
    compression: u16,
}

/// Builder for resource packages
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    resources: Vec<PendingResource>,
    minor_version: u32,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            minor_version: 1,
        }
    }

    /// Number of resources added so far
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resource has been added
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Add a payload stored as-is
    pub fn add_stored(&mut self, key: ResourceKey, data: Vec<u8>) -> &mut Self {
        let mem_size = data.len();
        self.resources.push(PendingResource {
            key,
            payload: data,
            mem_size,
            compression: STORED_COMPRESSION_FLAG,
        });
        self
    }

    /// Add a zlib-compressed payload
    ///
    /// Readers route on the size comparison, so a payload whose compressed
    /// length equals its raw length is stored instead.
    pub fn add_zlib(&mut self, key: ResourceKey, data: &[u8]) -> FormatResult<&mut Self> {
        let compressed = compress_zlib(data)?;
        if compressed.len() == data.len() {
            debug!(
                "Compressed size of {} equals raw size, storing uncompressed",
                key
            );
            return Ok(self.add_stored(key, data.to_vec()));
        }

        self.resources.push(PendingResource {
            key,
            payload: compressed,
            mem_size: data.len(),
            compression: ZLIB_COMPRESSION_FLAG,
        });
        Ok(self)
    }

    /// Serialize the package
    pub fn build(&self) -> FormatResult<Vec<u8>> {
        let mut writer = ByteCursor::writer();

        writer.write_tag(PACKAGE_MAGIC)?;
        writer.write_u32(SUPPORTED_MAJOR_VERSION)?;
        writer.write_u32(self.minor_version)?;
        writer.write_bytes(&[0; 24])?;
        let entry_count_slot = writer.reserve_u32()?;
        // Low index position, superseded by the high field
        writer.write_u32(0)?;
        let index_size_slot = writer.reserve_u32()?;
        writer.write_bytes(&[0; 12])?;
        writer.write_u32(INDEX_KIND)?;
        let index_position_slot = writer.reserve_u32()?;
        writer.write_bytes(&[0; 28])?;
        debug_assert_eq!(writer.position(), HEADER_SIZE);

        let mut entries = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            let chunk_offset = to_u32(writer.position(), "payload offset")?;
            writer.write_bytes(&resource.payload)?;
            entries.push(ResourceEntry {
                key: resource.key,
                chunk_offset,
                file_size: to_u32(resource.payload.len(), "payload size")?,
                mem_size: to_u32(resource.mem_size, "payload memory size")?,
                compression: resource.compression,
                committed: 1,
            });
        }

        let index_position = writer.position();
        let flags = PackageIndex::write(&entries, &mut writer)?;
        let index_size = writer.position() - index_position;

        writer.patch_u32(entry_count_slot, to_u32(entries.len(), "entry count")?)?;
        writer.patch_u32(index_size_slot, to_u32(index_size, "index size")?)?;
        writer.patch_u32(index_position_slot, to_u32(index_position, "index position")?)?;

        debug!(
            "Built package: {} entries, index flags 0x{:X} at {} ({} bytes)",
            entries.len(),
            flags.bits(),
            index_position,
            index_size
        );

        Ok(writer.into_inner())
    }
}

fn to_u32(value: usize, what: &str) -> FormatResult<u32> {
    u32::try_from(value)
        .map_err(|_| FormatError::Validation(format!("{what} {value} does not fit in 32 bits")))
}
