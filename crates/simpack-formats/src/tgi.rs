//! Resource keys (type / group / instance)
//!
//! A resource is identified by a 32-bit type, a 32-bit group and a 64-bit
//! instance. Most structures store the key in TGI order; the chunk wrapper
//! in front of mesh chunks stores it in ITG order (instance first).

use binrw::{BinRead, BinWrite};
use std::fmt;

use crate::cursor::ByteCursor;
use crate::error::FormatResult;

/// Encoded size of a key in either order
pub const RESOURCE_KEY_SIZE: usize = 16;

/// GEOM mesh resource type
pub const GEOM_TYPE: u32 = 0x015A_1849;
/// Plain DDS texture resource type
pub const DDS_TYPE: u32 = 0x00B2_D882;
/// RLE2 texture resource type
pub const RLE2_TYPE: u32 = 0x3453_CF95;
/// RLES texture resource type (with specular)
pub const RLES_TYPE: u32 = 0xBA85_6C78;
/// CAS part resource type
pub const CAS_PART_TYPE: u32 = 0x034A_EECB;

/// Type / group / instance triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct ResourceKey {
    /// Resource type id
    pub resource_type: u32,
    /// Resource group id
    pub group: u32,
    /// Instance id
    pub instance: u64,
}

impl ResourceKey {
    /// Create a key
    pub const fn new(resource_type: u32, group: u32, instance: u64) -> Self {
        Self {
            resource_type,
            group,
            instance,
        }
    }

    /// Read a key in TGI order
    pub fn read_tgi<B: AsRef<[u8]>>(cursor: &mut ByteCursor<B>) -> FormatResult<Self> {
        cursor.read_record(RESOURCE_KEY_SIZE)
    }

    /// Read a key in ITG order
    pub fn read_itg<B: AsRef<[u8]>>(cursor: &mut ByteCursor<B>) -> FormatResult<Self> {
        let instance = cursor.read_u64()?;
        let resource_type = cursor.read_u32()?;
        let group = cursor.read_u32()?;
        Ok(Self::new(resource_type, group, instance))
    }

    /// Write the key in TGI order
    pub fn write_tgi(&self, cursor: &mut ByteCursor<Vec<u8>>) -> FormatResult<()> {
        cursor.write_record(self)
    }

    /// Write the key in ITG order
    pub fn write_itg(&self, cursor: &mut ByteCursor<Vec<u8>>) -> FormatResult<()> {
        cursor.write_u64(self.instance)?;
        cursor.write_u32(self.resource_type)?;
        cursor.write_u32(self.group)
    }

    /// Short name of a well-known resource type, if any
    pub fn type_name(&self) -> Option<&'static str> {
        match self.resource_type {
            GEOM_TYPE => Some("GEOM"),
            DDS_TYPE => Some("DDS Image"),
            RLE2_TYPE => Some("RLE2 Image"),
            RLES_TYPE => Some("RLES Image"),
            CAS_PART_TYPE => Some("CAS Part"),
            _ => None,
        }
    }

    /// Human-readable label: type name (or hex type) and hex instance
    pub fn display_name(&self) -> String {
        match self.type_name() {
            Some(name) => format!("{name} - 0x{:016X}", self.instance),
            None => format!(
                "Type 0x{:08X} - 0x{:016X}",
                self.resource_type, self.instance
            ),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X}:0x{:08X}:0x{:016X}",
            self.resource_type, self.group, self.instance
        )
    }
}
