//! RefPack decompression
//!
//! RefPack is an LZ77 variant with a 2-byte signature, a 3- or 4-byte
//! big-endian size field and a stream of opcodes. Each opcode emits up to
//! three literal bytes from the input followed by a back-reference into the
//! output produced so far, except for the two literal-only forms:
//!
//! ```text
//! lead byte   length  literals             copy length             copy offset
//! 00..=7F     2       lead & 3             ((lead & 1C) >> 2) + 3  ((lead & 60) << 3) + b1 + 1
//! 80..=BF     3       (b1 >> 6) & 3        (lead & 3F) + 4         ((b1 & 3F) << 8) + b2 + 1
//! C0..=DF     4       lead & 3             ((lead & 0C) << 6) + b3 + 5
//!                                                                  ((lead & 10) << 12) + (b1 << 8) + b2 + 1
//! E0..=FB     1       ((lead & 1F) << 2) + 4
//! FC..=FF     1       lead & 3             (end of stream)
//! ```
//!
//! Back-references are copied one byte at a time: an offset shorter than the
//! copy length repeats the tail of the output, which is how runs are encoded.

use tracing::warn;

use super::MAX_DECOMPRESSION_SIZE;
use crate::error::{FormatError, FormatResult};

/// Lead byte value that selects a 4-byte size field
const LARGE_SIZE_FLAG: u8 = 0x80;

/// Input reader that turns underruns into stream corruption
struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn byte(&mut self) -> FormatResult<u8> {
        let value = *self.data.get(self.pos).ok_or_else(|| {
            FormatError::CorruptStream(format!("RefPack input ends at offset {}", self.pos))
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn bytes(&mut self, count: usize) -> FormatResult<&'a [u8]> {
        let end = self.pos + count;
        let slice = self.data.get(self.pos..end).ok_or_else(|| {
            FormatError::CorruptStream(format!(
                "RefPack literal run of {count} bytes at offset {} exceeds input of {} bytes",
                self.pos,
                self.data.len()
            ))
        })?;
        self.pos = end;
        Ok(slice)
    }
}

/// A decoded opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Op {
    literals: usize,
    copy_len: usize,
    copy_offset: usize,
    last: bool,
}

fn read_op(input: &mut Input<'_>) -> FormatResult<Op> {
    let lead = input.byte()?;
    let op = match lead {
        0x00..=0x7F => {
            let b1 = input.byte()? as usize;
            let lead = lead as usize;
            Op {
                literals: lead & 0x03,
                copy_len: ((lead & 0x1C) >> 2) + 3,
                copy_offset: ((lead & 0x60) << 3) + b1 + 1,
                last: false,
            }
        }
        0x80..=0xBF => {
            let b1 = input.byte()? as usize;
            let b2 = input.byte()? as usize;
            Op {
                literals: (b1 >> 6) & 0x03,
                copy_len: (lead as usize & 0x3F) + 4,
                copy_offset: ((b1 & 0x3F) << 8) + b2 + 1,
                last: false,
            }
        }
        0xC0..=0xDF => {
            let b1 = input.byte()? as usize;
            let b2 = input.byte()? as usize;
            let b3 = input.byte()? as usize;
            let lead = lead as usize;
            Op {
                literals: lead & 0x03,
                copy_len: ((lead & 0x0C) << 6) + b3 + 5,
                copy_offset: ((lead & 0x10) << 12) + (b1 << 8) + b2 + 1,
                last: false,
            }
        }
        0xE0..=0xFB => Op {
            literals: ((lead as usize & 0x1F) << 2) + 4,
            copy_len: 0,
            copy_offset: 0,
            last: false,
        },
        0xFC..=0xFF => Op {
            literals: lead as usize & 0x03,
            copy_len: 0,
            copy_offset: 0,
            last: true,
        },
    };
    Ok(op)
}

/// Read the signature and the declared decompressed size
fn read_header(input: &mut Input<'_>) -> FormatResult<usize> {
    let flags = input.byte()?;
    // Signature byte, already sniffed by the caller
    input.byte()?;

    let width = if flags == LARGE_SIZE_FLAG { 4 } else { 3 };
    let size = input
        .bytes(width)?
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok(size)
}

/// Decompress a RefPack stream
///
/// The size declared by the stream drives decoding. A different
/// `expected_size` is logged and otherwise ignored, since some producers
/// round the index's memory size.
pub fn decompress(data: &[u8], expected_size: usize) -> FormatResult<Vec<u8>> {
    let mut input = Input { data, pos: 0 };
    let declared = read_header(&mut input)?;

    if declared > MAX_DECOMPRESSION_SIZE {
        return Err(FormatError::CorruptStream(format!(
            "RefPack declared size {declared} exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
        )));
    }
    if declared != expected_size {
        warn!(
            "RefPack declared size {} differs from expected size {}",
            declared, expected_size
        );
    }

    let mut output = Vec::with_capacity(declared);
    while output.len() < declared {
        let op = read_op(&mut input)?;

        if output.len() + op.literals + op.copy_len > declared {
            return Err(FormatError::CorruptStream(format!(
                "RefPack opcode at input offset {} writes past declared size {declared}",
                input.pos
            )));
        }

        output.extend_from_slice(input.bytes(op.literals)?);

        if op.copy_len > 0 {
            let source = output.len().checked_sub(op.copy_offset).ok_or_else(|| {
                FormatError::CorruptStream(format!(
                    "RefPack copy offset {} reaches before start of output (position {})",
                    op.copy_offset,
                    output.len()
                ))
            })?;
            for i in 0..op.copy_len {
                let byte = output[source + i];
                output.push(byte);
            }
        }

        if op.last {
            break;
        }
    }

    if output.len() != declared {
        return Err(FormatError::CorruptStream(format!(
            "RefPack stream ended after {} of {declared} bytes",
            output.len()
        )));
    }

    Ok(output)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// RefPack header with a 3-byte size
    fn header(size: usize) -> Vec<u8> {
        vec![0x10, 0xFB, (size >> 16) as u8, (size >> 8) as u8, size as u8]
    }

    /// Literal-only encoding: 0xE0 runs of multiples of four, then a terminal op
    fn encode_literals(data: &[u8]) -> Vec<u8> {
        let mut out = header(data.len());
        let mut rest = data;
        while rest.len() >= 4 {
            let run = (rest.len() / 4 * 4).min(112);
            out.push(0xE0 | ((run - 4) >> 2) as u8);
            out.extend_from_slice(&rest[..run]);
            rest = &rest[run..];
        }
        out.push(0xFC | rest.len() as u8);
        out.extend_from_slice(rest);
        out
    }

    #[test]
    fn test_literal_runs() {
        let mut stream = header(5);
        stream.extend_from_slice(&[0xE0, b'A', b'B', b'C', b'D', 0xFD, b'E']);
        assert_eq!(decompress(&stream, 5).unwrap(), b"ABCDE");
    }

    #[test]
    fn test_short_copy_offset_one() {
        // 1 literal, then 7 bytes copied from offset 1
        let mut stream = header(8);
        stream.extend_from_slice(&[0x11, 0x00, b'A', 0xFC]);
        assert_eq!(decompress(&stream, 8).unwrap(), b"AAAAAAAA");
    }

    #[test]
    fn test_medium_copy() {
        let mut stream = header(12);
        stream.extend_from_slice(&[0xE0, b'a', b'b', b'c', b'd']);
        // 0 literals, 8 bytes from offset 4
        stream.extend_from_slice(&[0x84, 0x00, 0x03, 0xFC]);
        assert_eq!(decompress(&stream, 12).unwrap(), b"abcdabcdabcd");
    }

    #[test]
    fn test_medium_copy_with_literals() {
        let mut stream = header(10);
        // 2 literals carried in b1's top bits, 8 bytes from offset 2
        stream.extend_from_slice(&[0x84, 0x80, 0x01, b'x', b'y', 0xFC]);
        assert_eq!(decompress(&stream, 10).unwrap(), b"xyxyxyxyxy");
    }

    #[test]
    fn test_long_copy() {
        let mut stream = header(12);
        // 2 literals, 10 bytes from offset 2
        stream.extend_from_slice(&[0xC2, 0x00, 0x01, 0x05, b'x', b'y', 0xFC]);
        assert_eq!(decompress(&stream, 12).unwrap(), b"xyxyxyxyxyxy");
    }

    #[test]
    fn test_long_copy_large_length() {
        // copy length ((0x0C) << 6) + 0xFF + 5 = 1028 from offset 1
        let mut stream = header(1029);
        stream.extend_from_slice(&[0xCD, 0x00, 0x00, 0xFF, b'z', 0xFC]);
        let out = decompress(&stream, 1029).unwrap();
        assert_eq!(out.len(), 1029);
        assert!(out.iter().all(|&b| b == b'z'));
    }

    #[test]
    fn test_four_byte_size_header() {
        let stream = [0x80, 0xFB, 0x00, 0x00, 0x00, 0x04, 0xE0, b'W', b'X', b'Y', b'Z', 0xFC];
        assert_eq!(decompress(&stream, 4).unwrap(), b"WXYZ");
    }

    #[test]
    fn test_terminal_with_literals() {
        let mut stream = header(3);
        stream.extend_from_slice(&[0xFF, 1, 2, 3]);
        assert_eq!(decompress(&stream, 3).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_stops_at_declared_size_without_terminal() {
        let mut stream = header(4);
        stream.extend_from_slice(&[0xE0, 9, 8, 7, 6]);
        assert_eq!(decompress(&stream, 4).unwrap(), [9, 8, 7, 6]);
    }

    #[test]
    fn test_expected_size_mismatch_is_tolerated() {
        let mut stream = header(4);
        stream.extend_from_slice(&[0xE0, 1, 2, 3, 4, 0xFC]);
        assert_eq!(decompress(&stream, 5).unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_copy_before_start() {
        let mut stream = header(5);
        stream.extend_from_slice(&[0x00, 0x04, 0xFC]);
        assert!(matches!(
            decompress(&stream, 5),
            Err(FormatError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let mut stream = header(8);
        stream.extend_from_slice(&[0xE0, 1, 2]);
        assert!(matches!(
            decompress(&stream, 8),
            Err(FormatError::CorruptStream(_))
        ));

        assert!(matches!(
            decompress(&[0x10, 0xFB, 0x00], 0),
            Err(FormatError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_output_overrun() {
        let mut stream = header(2);
        stream.extend_from_slice(&[0xE0, 1, 2, 3, 4]);
        assert!(matches!(
            decompress(&stream, 2),
            Err(FormatError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_early_terminal() {
        let mut stream = header(6);
        stream.extend_from_slice(&[0xFD, 1]);
        assert!(matches!(
            decompress(&stream, 6),
            Err(FormatError::CorruptStream(_))
        ));
    }

    proptest! {
        #[test]
        fn literal_streams_decode_verbatim(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let stream = encode_literals(&data);
            let out = decompress(&stream, data.len()).unwrap();
            prop_assert_eq!(out, data);
        }
    }
}
