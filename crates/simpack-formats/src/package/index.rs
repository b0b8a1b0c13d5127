//! Package index: flags, constant fields and resource entries

use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{FormatError, FormatResult};
use crate::tgi::ResourceKey;

/// Offset value marking an entry without payload
pub const NO_DATA_OFFSET: u32 = 0xFFFF_FFFF;

/// Bit carried in the on-disk file size that is not part of the size
pub const FILE_SIZE_FLAG: u32 = 0x8000_0000;

/// Index flags: which key fields are stored once for all entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexFlags(u32);

impl IndexFlags {
    /// Resource type is shared by all entries
    pub const CONSTANT_TYPE: u32 = 0x01;
    /// Resource group is shared by all entries
    pub const CONSTANT_GROUP: u32 = 0x02;
    /// High half of the instance is shared by all entries
    pub const CONSTANT_INSTANCE_HIGH: u32 = 0x04;

    /// Wrap raw flag bits
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether the type is stored once
    pub const fn constant_type(self) -> bool {
        self.0 & Self::CONSTANT_TYPE != 0
    }

    /// Whether the group is stored once
    pub const fn constant_group(self) -> bool {
        self.0 & Self::CONSTANT_GROUP != 0
    }

    /// Whether the instance high half is stored once
    pub const fn constant_instance_high(self) -> bool {
        self.0 & Self::CONSTANT_INSTANCE_HIGH != 0
    }

    /// Pick flags for a set of keys: a field is constant when all keys share it
    pub fn for_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceKey>,
    {
        let mut keys = keys.into_iter();
        let Some(first) = keys.next() else {
            return Self(0);
        };

        let mut bits = Self::CONSTANT_TYPE | Self::CONSTANT_GROUP | Self::CONSTANT_INSTANCE_HIGH;
        for key in keys {
            if key.resource_type != first.resource_type {
                bits &= !Self::CONSTANT_TYPE;
            }
            if key.group != first.group {
                bits &= !Self::CONSTANT_GROUP;
            }
            if key.instance >> 32 != first.instance >> 32 {
                bits &= !Self::CONSTANT_INSTANCE_HIGH;
            }
        }
        Self(bits)
    }
}

/// One resource in the package index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Type / group / instance
    pub key: ResourceKey,
    /// Payload offset from the start of the package
    pub chunk_offset: u32,
    /// Payload size on disk, flag bit removed
    pub file_size: u32,
    /// Payload size once decompressed
    pub mem_size: u32,
    /// Stored compression indicator (informational)
    pub compression: u16,
    /// Committed flag, 1 in practice
    pub committed: u16,
}

impl ResourceEntry {
    /// Whether the payload must be decompressed
    ///
    /// Routing follows the size comparison; the stored compression
    /// indicator is not consulted.
    pub fn is_compressed(&self) -> bool {
        self.file_size != self.mem_size
    }

    /// Whether the entry points at a payload
    pub fn has_data(&self) -> bool {
        self.chunk_offset != NO_DATA_OFFSET
    }

    /// Resource type as `0xXXXXXXXX`
    pub fn type_hex(&self) -> String {
        format!("0x{:08X}", self.key.resource_type)
    }

    /// Resource group as `0xXXXXXXXX`
    pub fn group_hex(&self) -> String {
        format!("0x{:08X}", self.key.group)
    }

    /// Instance as `0xXXXXXXXXXXXXXXXX`
    pub fn instance_hex(&self) -> String {
        format!("0x{:016X}", self.key.instance)
    }

    /// Label for listings
    pub fn display_name(&self) -> String {
        self.key.display_name()
    }
}

/// Parsed index: the flags and the entries
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    /// Constant-field flags
    pub flags: IndexFlags,
    /// Entries in index order
    pub entries: Vec<ResourceEntry>,
}

fn read_varying(cursor: &mut ByteCursor<&[u8]>, constant: Option<u32>) -> FormatResult<u32> {
    match constant {
        Some(value) => Ok(value),
        None => cursor.read_u32(),
    }
}

impl PackageIndex {
    /// Parse `entry_count` entries at the cursor
    pub fn parse(cursor: &mut ByteCursor<&[u8]>, entry_count: u32) -> FormatResult<Self> {
        let flags = IndexFlags::new(cursor.read_u32()?);

        let constant_type = flags.constant_type().then(|| cursor.read_u32()).transpose()?;
        let constant_group = flags.constant_group().then(|| cursor.read_u32()).transpose()?;
        let constant_instance_high = flags
            .constant_instance_high()
            .then(|| cursor.read_u32())
            .transpose()?;

        debug!(
            "Package index flags 0x{:X}, {} entries at offset {}",
            flags.bits(),
            entry_count,
            cursor.position()
        );

        // Each entry is at least 20 bytes, so a count the buffer cannot hold is corrupt
        let minimum = entry_count as usize * 20;
        if minimum > cursor.remaining() {
            return Err(FormatError::OutOfRange {
                offset: cursor.position(),
                requested: minimum,
                available: cursor.remaining(),
            });
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let resource_type = read_varying(cursor, constant_type)?;
            let group = read_varying(cursor, constant_group)?;
            let instance_high = read_varying(cursor, constant_instance_high)?;
            let instance_low = cursor.read_u32()?;
            let chunk_offset = cursor.read_u32()?;
            let file_size = cursor.read_u32()? & !FILE_SIZE_FLAG;
            let mem_size = cursor.read_u32()?;
            let compression = cursor.read_u16()?;
            let committed = cursor.read_u16()?;

            entries.push(ResourceEntry {
                key: ResourceKey::new(
                    resource_type,
                    group,
                    (u64::from(instance_high) << 32) | u64::from(instance_low),
                ),
                chunk_offset,
                file_size,
                mem_size,
                compression,
                committed,
            });
        }

        Ok(Self { flags, entries })
    }

    /// Write the index, choosing constant fields from the entries
    pub fn write(
        entries: &[ResourceEntry],
        writer: &mut ByteCursor<Vec<u8>>,
    ) -> FormatResult<IndexFlags> {
        let flags = IndexFlags::for_keys(entries.iter().map(|e| &e.key));
        writer.write_u32(flags.bits())?;

        if let Some(first) = entries.first() {
            if flags.constant_type() {
                writer.write_u32(first.key.resource_type)?;
            }
            if flags.constant_group() {
                writer.write_u32(first.key.group)?;
            }
            if flags.constant_instance_high() {
                writer.write_u32((first.key.instance >> 32) as u32)?;
            }
        }

        for entry in entries {
            if !flags.constant_type() {
                writer.write_u32(entry.key.resource_type)?;
            }
            if !flags.constant_group() {
                writer.write_u32(entry.key.group)?;
            }
            if !flags.constant_instance_high() {
                writer.write_u32((entry.key.instance >> 32) as u32)?;
            }
            writer.write_u32(entry.key.instance as u32)?;
            writer.write_u32(entry.chunk_offset)?;
            writer.write_u32(entry.file_size | FILE_SIZE_FLAG)?;
            writer.write_u32(entry.mem_size)?;
            writer.write_u16(entry.compression)?;
            writer.write_u16(entry.committed)?;
        }

        Ok(flags)
    }
}
