//! Embedded shader parameter block (MTNF)
//!
//! ```text
//! u32  size (excludes itself)
//! ---- block start, entry offsets are relative to here
//! [4]  tag "MTNF" or "MTRL"
//! [8]  reserved
//! u32  entry count
//! 16 bytes per entry: field hash, datatype, element count, data offset
//! data words
//! ```

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::cursor::ByteCursor;
use crate::error::FormatResult;

/// Primary parameter block tag
pub const MTNF_TAG: [u8; 4] = *b"MTNF";
/// Alternate parameter block tag
pub const MTRL_TAG: [u8; 4] = *b"MTRL";

/// More entries than this marks a block as malformed
pub const MAX_SHADER_PARAMETERS: u32 = 100;

/// Parameter datatype: float words
pub const PARAM_FLOAT: u32 = 1;
/// Parameter datatype: integer words
pub const PARAM_INTEGER: u32 = 2;
/// Parameter datatype: texture reference (index into the reference list)
pub const PARAM_TEXTURE: u32 = 4;

/// Reserved bytes written into new blocks
const DEFAULT_RESERVED: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x74, 0x00, 0x00, 0x00];

/// Known texture slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureSemantic {
    /// Diffuse map
    Diffuse,
    /// Normal map
    Normal,
    /// Specular map
    Specular,
    /// Alpha map
    Alpha,
    /// Emission map
    Emission,
    /// Self-illumination map
    SelfIllumination,
}

impl TextureSemantic {
    /// Map a parameter field hash to a texture slot
    pub fn from_field_hash(hash: u32) -> Option<Self> {
        match hash {
            0x6CC0_FD85 => Some(Self::Diffuse),
            0x6E56_548A => Some(Self::Normal),
            0xAD52_8A60 => Some(Self::Specular),
            0xC3FA_AC4F => Some(Self::Alpha),
            0xF303_D152 => Some(Self::Emission),
            0x6E06_7554 => Some(Self::SelfIllumination),
            _ => None,
        }
    }

    /// Short lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuse",
            Self::Normal => "normal",
            Self::Specular => "specular",
            Self::Alpha => "alpha",
            Self::Emission => "emission",
            Self::SelfIllumination => "selfillum",
        }
    }
}

impl fmt::Display for TextureSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shader parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderParameter {
    /// FNV hash of the parameter name
    pub field: u32,
    /// Datatype id
    pub datatype: u32,
    /// Element count from the entry header
    ///
    /// Texture entries declare 4 but carry a single reference-list index, so
    /// this is not always `words.len()`.
    pub count: u32,
    /// Raw little-endian words
    pub words: Vec<u32>,
}

impl ShaderParameter {
    /// Words reinterpreted as floats
    pub fn as_floats(&self) -> Vec<f32> {
        self.words.iter().map(|w| f32::from_bits(*w)).collect()
    }

    /// Texture slot, when this is a texture parameter with a known field
    pub fn texture_semantic(&self) -> Option<TextureSemantic> {
        if self.datatype != PARAM_TEXTURE {
            return None;
        }
        TextureSemantic::from_field_hash(self.field)
    }
}

/// Parsed parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialBlock {
    /// `MTNF` or `MTRL`
    pub tag: [u8; 4],
    /// Bytes between the tag and the entry count
    pub reserved: [u8; 8],
    /// Parameters in entry order
    pub parameters: Vec<ShaderParameter>,
}

impl Default for MaterialBlock {
    fn default() -> Self {
        Self {
            tag: MTNF_TAG,
            reserved: DEFAULT_RESERVED,
            parameters: Vec::new(),
        }
    }
}

impl MaterialBlock {
    /// Texture slot to reference-list index
    pub fn texture_refs(&self) -> BTreeMap<TextureSemantic, u32> {
        self.parameters
            .iter()
            .filter_map(|p| Some((p.texture_semantic()?, *p.words.first()?)))
            .collect()
    }

    /// Parse the block body; `None` when the body is not a well-formed block
    fn parse(body: &[u8]) -> FormatResult<Option<Self>> {
        let mut cursor = ByteCursor::new(body);
        if cursor.remaining() < 16 {
            warn!("Shader block of {} bytes is too short to parse", body.len());
            return Ok(None);
        }

        let tag = cursor.read_tag()?;
        if tag != MTNF_TAG && tag != MTRL_TAG {
            warn!("Unexpected shader block tag {:02X?}, keeping it opaque", tag);
            return Ok(None);
        }
        let reserved = cursor.read_array::<8>()?;
        let count = cursor.read_u32()?;
        if count > MAX_SHADER_PARAMETERS {
            warn!("Shader block declares {} parameters, keeping it opaque", count);
            return Ok(None);
        }

        let headers_end = 16 + count as usize * 16;
        if headers_end > body.len() {
            warn!("Shader block entry table overruns the block, keeping it opaque");
            return Ok(None);
        }

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let field = cursor.read_u32()?;
            let datatype = cursor.read_u32()?;
            let count = cursor.read_u32()?;
            let offset = cursor.read_u32()? as usize;
            headers.push((field, datatype, count, offset));
        }

        let mut parameters = Vec::with_capacity(headers.len());
        for (field, datatype, count, offset) in headers {
            let word_count = if datatype == PARAM_TEXTURE {
                1
            } else {
                count as usize
            };
            let end = offset.checked_add(word_count.saturating_mul(4));
            if end.is_none_or(|end| end > body.len()) {
                warn!(
                    "Shader parameter 0x{:08X} data at {} overruns the block, skipping it",
                    field, offset
                );
                continue;
            }
            cursor.seek(offset)?;
            let words = (0..word_count)
                .map(|_| cursor.read_u32())
                .collect::<FormatResult<Vec<_>>>()?;
            parameters.push(ShaderParameter {
                field,
                datatype,
                count,
                words,
            });
        }

        debug!("Parsed shader block with {} parameters", parameters.len());
        Ok(Some(Self {
            tag,
            reserved,
            parameters,
        }))
    }

    /// Write the block body with data laid out after the entry table
    fn write(&self, writer: &mut ByteCursor<Vec<u8>>) -> FormatResult<()> {
        writer.write_tag(self.tag)?;
        writer.write_bytes(&self.reserved)?;
        writer.write_u32(self.parameters.len() as u32)?;

        let mut offset = 16 + 16 * self.parameters.len();
        for parameter in &self.parameters {
            writer.write_u32(parameter.field)?;
            writer.write_u32(parameter.datatype)?;
            writer.write_u32(parameter.count)?;
            writer.write_u32(offset as u32)?;
            offset += parameter.words.len() * 4;
        }
        for parameter in &self.parameters {
            for word in &parameter.words {
                writer.write_u32(*word)?;
            }
        }
        Ok(())
    }
}

/// Body of the parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderBlock {
    /// Decoded parameters
    Parsed(MaterialBlock),
    /// Bytes that could not be decoded, written back unchanged
    Opaque(Vec<u8>),
}

impl ShaderBlock {
    /// Read the size-prefixed block; the cursor ends just past it
    pub fn read<B: AsRef<[u8]>>(cursor: &mut ByteCursor<B>) -> FormatResult<Self> {
        let size = cursor.read_u32()? as usize;
        let start = cursor.position();
        let body = cursor.read_bytes(size)?.to_vec();
        debug!("Shader block at {}, {} bytes", start, size);

        Ok(match MaterialBlock::parse(&body)? {
            Some(block) => Self::Parsed(block),
            None => Self::Opaque(body),
        })
    }

    /// Write the size-prefixed block, patching the size afterwards
    pub fn write(&self, writer: &mut ByteCursor<Vec<u8>>) -> FormatResult<()> {
        let size_slot = writer.reserve_u32()?;
        match self {
            Self::Parsed(block) => block.write(writer)?,
            Self::Opaque(bytes) => writer.write_bytes(bytes)?,
        }
        let size = writer.position() - size_slot.offset() - 4;
        writer.patch_u32(size_slot, size as u32)
    }

    /// Texture slot to reference-list index; empty for opaque blocks
    pub fn texture_refs(&self) -> BTreeMap<TextureSemantic, u32> {
        match self {
            Self::Parsed(block) => block.texture_refs(),
            Self::Opaque(_) => BTreeMap::new(),
        }
    }

    /// Parameters; empty for opaque blocks
    pub fn parameters(&self) -> &[ShaderParameter] {
        match self {
            Self::Parsed(block) => &block.parameters,
            Self::Opaque(_) => &[],
        }
    }
}

/// Shader reference plus its parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedShader {
    /// Shader name hash
    pub id: u32,
    /// Name from the name table, hex when unknown
    pub name: String,
    /// Parameter block
    pub block: ShaderBlock,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_block() -> MaterialBlock {
        MaterialBlock {
            parameters: vec![
                ShaderParameter {
                    field: 0x6CC0_FD85,
                    datatype: PARAM_TEXTURE,
                    count: 4,
                    words: vec![2],
                },
                ShaderParameter {
                    field: 0x1234_5678,
                    datatype: PARAM_FLOAT,
                    count: 1,
                    words: vec![1.5f32.to_bits()],
                },
                ShaderParameter {
                    field: 0x6E56_548A,
                    datatype: PARAM_TEXTURE,
                    count: 4,
                    words: vec![1],
                },
            ],
            ..MaterialBlock::default()
        }
    }

    #[test]
    fn test_write_layout_and_read_back() {
        let block = ShaderBlock::Parsed(sample_block());
        let mut writer = ByteCursor::writer();
        block.write(&mut writer).unwrap();
        let bytes = writer.into_inner();

        // 16 header bytes, 3 entries, 3 data words
        let body_len = 16 + 3 * 16 + 3 * 4;
        assert_eq!(bytes.len(), 4 + body_len);
        assert_eq!(&bytes[0..4], &(body_len as u32).to_le_bytes());
        assert_eq!(&bytes[4..8], b"MTNF");
        // First data offset follows the entry table
        assert_eq!(&bytes[4 + 24..4 + 28], &4u32.to_le_bytes());
        assert_eq!(&bytes[4 + 28..4 + 32], &64u32.to_le_bytes());
        assert_eq!(&bytes[4 + 44..4 + 48], &68u32.to_le_bytes());

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let parsed = ShaderBlock::read(&mut cursor).unwrap();
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(parsed, block);
        assert_eq!(parsed.parameters()[1].as_floats(), vec![1.5]);

        let refs = parsed.texture_refs();
        assert_eq!(refs.get(&TextureSemantic::Diffuse), Some(&2));
        assert_eq!(refs.get(&TextureSemantic::Normal), Some(&1));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_unknown_tag_is_opaque() {
        let mut writer = ByteCursor::writer();
        writer.write_u32(20).unwrap();
        writer.write_tag(*b"XXXX").unwrap();
        writer.write_bytes(&[0xAB; 16]).unwrap();
        let bytes = writer.into_inner();

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let block = ShaderBlock::read(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 24);
        assert!(matches!(&block, ShaderBlock::Opaque(body) if body.len() == 20));
        assert!(block.texture_refs().is_empty());

        let mut out = ByteCursor::writer();
        block.write(&mut out).unwrap();
        assert_eq!(out.into_inner(), bytes);
    }

    #[test]
    fn test_absurd_count_is_opaque() {
        let mut body = Vec::new();
        body.extend_from_slice(b"MTNF");
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&101u32.to_le_bytes());
        let mut bytes = (body.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&body);

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let block = ShaderBlock::read(&mut cursor).unwrap();
        assert!(matches!(block, ShaderBlock::Opaque(_)));
    }

    fn block_bytes(tag: &[u8; 4], entries: &[[u32; 4]], data: &[u32]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(tag);
        body.extend_from_slice(&[0; 8]);
        body.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for word in entries.iter().flatten().chain(data) {
            body.extend_from_slice(&word.to_le_bytes());
        }
        let mut bytes = (body.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&body);
        bytes
    }

    #[test]
    fn test_texture_entry_reads_one_index() {
        // Count 4 with a single index word, as stored in game files
        let bytes = block_bytes(b"MTNF", &[[0x6CC0_FD85, PARAM_TEXTURE, 4, 32]], &[2]);

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let block = ShaderBlock::read(&mut cursor).unwrap();
        assert!(matches!(block, ShaderBlock::Parsed(_)));
        assert_eq!(block.parameters()[0].count, 4);
        assert_eq!(block.parameters()[0].words, vec![2]);
        assert_eq!(block.texture_refs().get(&TextureSemantic::Diffuse), Some(&2));

        let mut out = ByteCursor::writer();
        block.write(&mut out).unwrap();
        assert_eq!(out.into_inner(), bytes);
    }

    #[test]
    fn test_overrunning_entry_is_skipped() {
        let bytes = block_bytes(
            b"MTRL",
            &[
                [0x1234_5678, PARAM_FLOAT, 8, 64],
                [0x6E56_548A, PARAM_TEXTURE, 4, 64],
                [0x6CC0_FD85, PARAM_TEXTURE, 4, 400],
            ],
            &[3],
        );

        let mut cursor = ByteCursor::new(bytes.as_slice());
        let block = ShaderBlock::read(&mut cursor).unwrap();
        assert_eq!(cursor.remaining(), 0);
        assert!(matches!(block, ShaderBlock::Parsed(_)));
        assert_eq!(block.parameters().len(), 1);
        assert_eq!(block.parameters()[0].field, 0x6E56_548A);

        let refs = block.texture_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.get(&TextureSemantic::Normal), Some(&3));
    }
}
