//! RLE command stream expansion

use tracing::debug;

use super::dds::{DXT5_BLOCK_SIZE, DdsImage};
use super::header::{MipRecord, RLE_HEADER_SIZE, RleHeader};
use crate::cursor::ByteCursor;
use crate::error::{FormatError, FormatResult};

/// Alpha half of a block whose pixels are all opaque
const OPAQUE_ALPHA: [u8; 8] = [0x00, 0x05, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Bytes each pool contributes to one block
const POOL_WIDTHS: [usize; 4] = [2, 6, 4, 4];

/// Run kinds in the low two bits of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Transparent,
    Translucent,
    Opaque,
}

impl RunKind {
    fn from_op(op: u16) -> FormatResult<Self> {
        match op {
            0 => Ok(Self::Transparent),
            1 => Ok(Self::Translucent),
            2 => Ok(Self::Opaque),
            _ => Err(FormatError::CorruptStream(format!(
                "RLE command op {op} is not defined"
            ))),
        }
    }
}

/// Read positions into the data pools of one mip
///
/// A mip's pool `p` spans from its own record's offset to the next record's,
/// so runs cannot consume data that belongs to the following mip.
struct PoolReader<'a> {
    data: &'a [u8],
    positions: [usize; 4],
    ends: [usize; 4],
}

impl<'a> PoolReader<'a> {
    fn take(&mut self, pool: usize) -> FormatResult<&'a [u8]> {
        let start = self.positions[pool];
        let end = start + POOL_WIDTHS[pool];
        let bytes = if end <= self.ends[pool] {
            self.data.get(start..end)
        } else {
            None
        };
        let bytes = bytes.ok_or_else(|| {
            FormatError::CorruptStream(format!(
                "pool {pool} read at {start} runs past its end at {}",
                self.ends[pool].min(self.data.len())
            ))
        })?;
        self.positions[pool] = end;
        Ok(bytes)
    }
}

/// Size of a mip level's DXT5 blocks
pub fn mip_size(width: u32, height: u32, level: usize) -> usize {
    let dimension = |value: u32| {
        let scaled = value.checked_shr(level as u32).unwrap_or(0).max(1);
        scaled.div_ceil(4) as usize
    };
    dimension(width) * dimension(height) * DXT5_BLOCK_SIZE
}

fn decode_mip(
    data: &[u8],
    record: &MipRecord,
    next: &MipRecord,
    expected: usize,
) -> FormatResult<Vec<u8>> {
    let (start, end) = (record.command, next.command);
    if start > end || end > data.len() {
        return Err(FormatError::CorruptStream(format!(
            "command range {start}..{end} outside the {}-byte texture",
            data.len()
        )));
    }

    let mut pools = PoolReader {
        data,
        positions: record.pools,
        ends: next.pools,
    };
    let mut blocks = Vec::with_capacity(expected);

    for code in data[start..end].chunks_exact(2) {
        let code = u16::from_le_bytes([code[0], code[1]]);
        let count = usize::from(code >> 2);
        let kind = RunKind::from_op(code & 3)?;
        if blocks.len() + count * DXT5_BLOCK_SIZE > expected {
            return Err(FormatError::CorruptStream(format!(
                "{kind:?} run of {count} blocks overflows the {expected}-byte mip"
            )));
        }
        match kind {
            RunKind::Transparent => {
                blocks.resize(blocks.len() + count * DXT5_BLOCK_SIZE, 0);
            }
            RunKind::Translucent => {
                for _ in 0..count {
                    for pool in 0..4 {
                        blocks.extend_from_slice(pools.take(pool)?);
                    }
                }
            }
            RunKind::Opaque => {
                for _ in 0..count {
                    blocks.extend_from_slice(&OPAQUE_ALPHA);
                    blocks.extend_from_slice(pools.take(2)?);
                    blocks.extend_from_slice(pools.take(3)?);
                }
            }
        }
    }

    if blocks.len() != expected {
        return Err(FormatError::CorruptStream(format!(
            "commands cover {} of the {expected} mip bytes",
            blocks.len()
        )));
    }
    Ok(blocks)
}

/// Expand an `RLE2` or `RLES` texture into DXT5 blocks
pub fn decode(data: &[u8]) -> FormatResult<DdsImage> {
    let mut cursor = ByteCursor::new(data);
    let header = RleHeader::read(&mut cursor)?;
    let format = header.format()?;
    let mip_count = usize::from(header.mip_count);
    debug!(
        "{:?} texture {}x{}, {} mips",
        format, header.width, header.height, mip_count
    );

    let table_len = mip_count * format.record_size();
    if RLE_HEADER_SIZE + table_len > data.len() {
        return Err(FormatError::OutOfRange {
            offset: RLE_HEADER_SIZE,
            requested: table_len,
            available: cursor.remaining(),
        });
    }

    let mut records = (0..mip_count)
        .map(|_| MipRecord::read(&mut cursor, format))
        .collect::<FormatResult<Vec<_>>>()?;
    if let Some(first) = records.first() {
        let terminal = MipRecord::terminal(first, data.len());
        records.push(terminal);
    }

    let (width, height) = (u32::from(header.width), u32::from(header.height));
    let mips = records
        .windows(2)
        .enumerate()
        .map(|(level, pair)| {
            decode_mip(data, &pair[0], &pair[1], mip_size(width, height, level))
        })
        .collect::<FormatResult<Vec<_>>>()?;

    debug!(
        "Expanded {} mips into {} block bytes",
        mips.len(),
        mips.iter().map(Vec::len).sum::<usize>()
    );

    Ok(DdsImage {
        width,
        height,
        mip_count: u32::from(header.mip_count),
        mips,
    })
}
