//! RLE2 / RLES texture decoding
//!
//! RLE textures store DXT5 blocks split into four data pools plus a command
//! stream of 16-bit run codes per mip. Decoding reassembles the blocks and
//! wraps them in a DDS container:
//!
//! ```text
//! header (16 bytes): fourcc, RLE2|RLES, width, height, mip count, reserved
//! mip records (20 or 24 bytes each)
//! command streams, then data pools
//! ```
//!
//! Encoding is not supported.

mod decoder;
mod dds;
mod header;

pub use decoder::{decode, mip_size};
pub use dds::{DDS_HEADER_SIZE, DDS_MAGIC, DXT5_BLOCK_SIZE, DdsImage};
pub use header::{
    DXT5_FOURCC, MipRecord, RLE_HEADER_SIZE, RLE2_TAG, RLES_TAG, RleFormat, RleHeader,
};
