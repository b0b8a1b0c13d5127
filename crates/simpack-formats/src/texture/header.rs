//! RLE texture header and per-mip offset records

use binrw::{BinRead, BinWrite};
use tracing::warn;

use crate::cursor::ByteCursor;
use crate::error::{FormatError, FormatResult};

/// Block compression the RLE stream expands to
pub const DXT5_FOURCC: [u8; 4] = *b"DXT5";

/// `RLE2` sub-format tag, little-endian
pub const RLE2_TAG: u32 = 0x3245_4C52;
/// `RLES` sub-format tag, little-endian
pub const RLES_TAG: u32 = 0x5345_4C52;

/// Encoded header size
pub const RLE_HEADER_SIZE: usize = 16;

/// Per-mip record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RleFormat {
    /// Command offset and four pool offsets
    Rle2,
    /// Command offset and five pool offsets; the fifth holds specular data
    Rles,
}

impl RleFormat {
    /// Format for a sub-format tag
    pub fn from_tag(tag: u32) -> FormatResult<Self> {
        match tag {
            RLE2_TAG => Ok(Self::Rle2),
            RLES_TAG => Ok(Self::Rles),
            value => Err(FormatError::UnsupportedVersion {
                what: "RLE texture",
                value,
            }),
        }
    }

    /// Offsets per mip record
    pub fn offsets_per_mip(self) -> usize {
        match self {
            Self::Rle2 => 5,
            Self::Rles => 6,
        }
    }

    /// Bytes per mip record
    pub fn record_size(self) -> usize {
        self.offsets_per_mip() * 4
    }
}

/// 16-byte RLE header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct RleHeader {
    /// Compression of the expanded blocks, `DXT5`
    pub fourcc: [u8; 4],
    /// `RLE2` or `RLES`
    pub tag: u32,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Number of mip levels
    pub mip_count: u16,
    /// Unused
    pub reserved: u16,
}

impl RleHeader {
    /// Read and check the header
    pub fn read(cursor: &mut ByteCursor<&[u8]>) -> FormatResult<Self> {
        let header: Self = cursor.read_record(RLE_HEADER_SIZE)?;
        if header.fourcc != DXT5_FOURCC {
            warn!(
                "RLE texture fourcc {:02X?}, decoding as DXT5",
                header.fourcc
            );
        }
        Ok(header)
    }

    /// Record layout for this header's tag
    pub fn format(&self) -> FormatResult<RleFormat> {
        RleFormat::from_tag(self.tag)
    }
}

/// Where one mip's command stream and data pools start
///
/// Pools are numbered by their place in a DXT5 block: pool 0 holds the alpha
/// endpoints, pool 1 the alpha indices, pool 2 the color endpoints and
/// pool 3 the color indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipRecord {
    /// Command stream offset
    pub command: usize,
    /// Pool offsets 0 to 3
    pub pools: [usize; 4],
    /// Specular pool (`RLES` only)
    pub pool4: Option<usize>,
}

impl MipRecord {
    /// Read one record; on disk the order is command, pool 2, 3, 0, 1 (, 4)
    pub fn read(cursor: &mut ByteCursor<&[u8]>, format: RleFormat) -> FormatResult<Self> {
        let command = cursor.read_u32()? as usize;
        let pool2 = cursor.read_u32()? as usize;
        let pool3 = cursor.read_u32()? as usize;
        let pool0 = cursor.read_u32()? as usize;
        let pool1 = cursor.read_u32()? as usize;
        let pool4 = match format {
            RleFormat::Rle2 => None,
            RleFormat::Rles => Some(cursor.read_u32()? as usize),
        };
        Ok(Self {
            command,
            pools: [pool0, pool1, pool2, pool3],
            pool4,
        })
    }

    /// Record following the last mip
    ///
    /// Each field takes the next on-disk field of the first mip; the last
    /// field becomes the buffer length.
    pub fn terminal(first: &Self, buffer_len: usize) -> Self {
        let [pool0, pool1, pool2, pool3] = first.pools;
        match first.pool4 {
            None => Self {
                command: pool2,
                pools: [pool1, buffer_len, pool3, pool0],
                pool4: None,
            },
            Some(pool4) => Self {
                command: pool2,
                pools: [pool1, pool4, pool3, pool0],
                pool4: Some(buffer_len),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_fields() {
        let mut bytes = b"DXT5RLE2".to_vec();
        for value in [64u16, 32, 7, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let mut cursor = ByteCursor::new(bytes.as_slice());
        let header = RleHeader::read(&mut cursor).unwrap();
        assert_eq!(header.tag, RLE2_TAG);
        assert_eq!((header.width, header.height, header.mip_count), (64, 32, 7));
        assert_eq!(header.format().unwrap(), RleFormat::Rle2);
        assert_eq!(cursor.position(), RLE_HEADER_SIZE);
    }

    #[test]
    fn test_unknown_tag() {
        let err = RleFormat::from_tag(u32::from_le_bytes(*b"RLE3")).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedVersion {
                what: "RLE texture",
                ..
            }
        ));
        assert_eq!(RleFormat::from_tag(RLES_TAG).unwrap().record_size(), 24);
    }

    #[test]
    fn test_record_order_and_terminal() {
        let mut bytes = Vec::new();
        for value in [100u32, 200, 300, 400, 500, 600] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let record = MipRecord::read(&mut cursor, RleFormat::Rle2).unwrap();
        assert_eq!(record.command, 100);
        assert_eq!(record.pools, [400, 500, 200, 300]);

        // Shifted: command <- pool 2, pool 2 <- pool 3, pool 3 <- pool 0, ...
        let terminal = MipRecord::terminal(&record, 900);
        assert_eq!(terminal.command, 200);
        assert_eq!(terminal.pools, [500, 900, 300, 400]);

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let record = MipRecord::read(&mut cursor, RleFormat::Rles).unwrap();
        assert_eq!(record.pool4, Some(600));
        let terminal = MipRecord::terminal(&record, 900);
        assert_eq!(terminal.pools[1], 600);
        assert_eq!(terminal.pool4, Some(900));
    }
}
