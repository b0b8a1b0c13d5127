//! Package header parsing and building

use binrw::{BinRead, BinWrite};
use tracing::warn;

use crate::error::{FormatError, FormatResult};

/// Package magic
pub const PACKAGE_MAGIC: [u8; 4] = *b"DBPF";

/// Encoded header size
pub const HEADER_SIZE: usize = 96;

/// Major version every known package uses
pub const SUPPORTED_MAJOR_VERSION: u32 = 2;

/// Conventional value of the index-kind field
pub const INDEX_KIND: u32 = 3;

/// Package header (96 bytes, little-endian)
///
/// ```text
/// 0   magic "DBPF"
/// 4   major, minor version
/// 12  24 reserved bytes (user version, timestamps)
/// 36  entry count
/// 40  index position (low)
/// 44  index size
/// 48  12 reserved bytes
/// 60  index kind (3)
/// 64  index position (high)
/// 68  28 reserved bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PackageHeader {
    /// Magic, "DBPF" in valid packages
    pub magic: [u8; 4],
    /// Major version
    pub major_version: u32,
    /// Minor version
    pub minor_version: u32,
    /// User version and timestamps, not interpreted
    pub reserved1: [u8; 24],
    /// Number of index entries
    pub entry_count: u32,
    /// Index position used by older writers
    pub index_position_low: u32,
    /// Size of the index in bytes
    pub index_size: u32,
    /// Unused
    pub reserved2: [u8; 12],
    /// Index kind, conventionally 3
    pub index_kind: u32,
    /// Index position used by current writers
    pub index_position_high: u32,
    /// Unused
    pub reserved3: [u8; 28],
}

impl PackageHeader {
    /// Create a header for `entry_count` entries with the index at `index_position`
    pub fn new(entry_count: u32, index_position: u32, index_size: u32) -> Self {
        Self {
            magic: PACKAGE_MAGIC,
            major_version: SUPPORTED_MAJOR_VERSION,
            minor_version: 1,
            reserved1: [0; 24],
            entry_count,
            index_position_low: 0,
            index_size,
            reserved2: [0; 12],
            index_kind: INDEX_KIND,
            index_position_high: index_position,
            reserved3: [0; 28],
        }
    }

    /// Index position: the high field if set, else the low field
    pub fn index_position(&self) -> u32 {
        if self.index_position_high != 0 {
            self.index_position_high
        } else {
            self.index_position_low
        }
    }

    /// Check the magic and warn about unexpected versions
    pub fn validate(&self) -> FormatResult<()> {
        if self.magic != PACKAGE_MAGIC {
            return Err(FormatError::BadMagic {
                expected: PACKAGE_MAGIC,
                found: self.magic,
            });
        }

        if self.major_version != SUPPORTED_MAJOR_VERSION {
            warn!(
                "Package major version {} (expected {}), reading best-effort",
                self.major_version, SUPPORTED_MAJOR_VERSION
            );
        }

        if self.index_kind != INDEX_KIND {
            warn!("Unusual package index kind {}", self.index_kind);
        }

        Ok(())
    }
}
