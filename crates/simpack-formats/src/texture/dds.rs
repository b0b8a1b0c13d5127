//! DDS container output for DXT5 block streams

use binrw::BinWrite;

use crate::cursor::ByteCursor;
use crate::error::FormatResult;

/// File magic, `"DDS "`
pub const DDS_MAGIC: [u8; 4] = *b"DDS ";

/// Header size including the magic
pub const DDS_HEADER_SIZE: usize = 128;

/// Bytes per 4x4 DXT5 block
pub const DXT5_BLOCK_SIZE: usize = 16;

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_LINEARSIZE: u32 = 0x8_0000;

const DDPF_FOURCC: u32 = 0x4;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;

#[derive(BinWrite)]
#[bw(little)]
struct PixelFormat {
    size: u32,
    flags: u32,
    fourcc: [u8; 4],
    rgb_bit_count: u32,
    masks: [u32; 4],
}

#[derive(BinWrite)]
#[bw(little)]
struct DdsHeader {
    magic: [u8; 4],
    size: u32,
    flags: u32,
    height: u32,
    width: u32,
    pitch_or_linear_size: u32,
    depth: u32,
    mip_map_count: u32,
    reserved1: [u32; 11],
    pixel_format: PixelFormat,
    caps: [u32; 4],
    reserved2: u32,
}

/// Decoded texture: DXT5 blocks per mip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Mip levels as declared by the source
    pub mip_count: u32,
    /// Block stream per mip, largest first
    pub mips: Vec<Vec<u8>>,
}

impl DdsImage {
    /// Row pitch of the top mip: one 16-byte block per 4 pixels
    pub fn pitch(&self) -> u32 {
        self.width.div_ceil(4) * DXT5_BLOCK_SIZE as u32
    }

    /// Total block bytes across all mips
    pub fn data_len(&self) -> usize {
        self.mips.iter().map(Vec::len).sum()
    }

    /// Serialize as a DDS file
    pub fn to_bytes(&self) -> FormatResult<Vec<u8>> {
        let mut caps = DDSCAPS_TEXTURE;
        if self.mip_count > 1 {
            caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        }

        let header = DdsHeader {
            magic: DDS_MAGIC,
            size: 124,
            flags: DDSD_CAPS
                | DDSD_HEIGHT
                | DDSD_WIDTH
                | DDSD_PIXELFORMAT
                | DDSD_MIPMAPCOUNT
                | DDSD_LINEARSIZE,
            height: self.height,
            width: self.width,
            pitch_or_linear_size: self.pitch(),
            depth: 0,
            mip_map_count: self.mip_count,
            reserved1: [0; 11],
            pixel_format: PixelFormat {
                size: 32,
                flags: DDPF_FOURCC,
                fourcc: *b"DXT5",
                rgb_bit_count: 0,
                masks: [0; 4],
            },
            caps: [caps, 0, 0, 0],
            reserved2: 0,
        };

        let mut writer = ByteCursor::new(Vec::with_capacity(DDS_HEADER_SIZE + self.data_len()));
        writer.write_record(&header)?;
        for mip in &self.mips {
            writer.write_bytes(mip)?;
        }
        Ok(writer.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_header_layout() {
        let image = DdsImage {
            width: 10,
            height: 8,
            mip_count: 1,
            mips: vec![vec![0xAB; 6 * DXT5_BLOCK_SIZE]],
        };
        let bytes = image.to_bytes().unwrap();

        assert_eq!(bytes.len(), DDS_HEADER_SIZE + 96);
        assert_eq!(&bytes[0..4], b"DDS ");
        assert_eq!(word(&bytes, 4), 124);
        assert_eq!(word(&bytes, 8), 0xA1007);
        assert_eq!(word(&bytes, 12), 8);
        assert_eq!(word(&bytes, 16), 10);
        // ceil(10 / 4) blocks of 16 bytes
        assert_eq!(word(&bytes, 20), 48);
        assert_eq!(word(&bytes, 28), 1);
        assert_eq!(word(&bytes, 76), 32);
        assert_eq!(word(&bytes, 80), DDPF_FOURCC);
        assert_eq!(&bytes[84..88], b"DXT5");
        assert_eq!(word(&bytes, 108), DDSCAPS_TEXTURE);
        assert_eq!(&bytes[DDS_HEADER_SIZE..DDS_HEADER_SIZE + 2], &[0xAB, 0xAB]);
    }

    #[test]
    fn test_mipmap_caps() {
        let image = DdsImage {
            width: 8,
            height: 8,
            mip_count: 4,
            mips: vec![vec![0; 64], vec![0; 16], vec![0; 16], vec![0; 16]],
        };
        let bytes = image.to_bytes().unwrap();
        assert_eq!(word(&bytes, 108), 0x40_1008);
        assert_eq!(bytes.len(), DDS_HEADER_SIZE + 112);
    }
}
