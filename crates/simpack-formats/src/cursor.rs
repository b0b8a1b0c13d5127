//! Positioned little-endian reader/writer over an in-memory buffer
//!
//! All package, mesh and texture codecs go through [`ByteCursor`]. Reads are
//! bounds-checked up front so that a truncated input surfaces as
//! [`FormatError::OutOfRange`] with the exact offset, rather than as a generic
//! end-of-file from the underlying reader. Writers reserve `u32` slots for
//! sizes and offsets that are only known after later content is emitted and
//! patch them once the value is available.

use binrw::{BinRead, BinWrite, Endian};
use std::io::Cursor;

use crate::error::{FormatError, FormatResult};

/// Handle to a reserved `u32` field in a [`ByteCursor`] writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSlot {
    offset: usize,
}

impl PatchSlot {
    /// Offset of the reserved field within the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Cursor over a byte buffer with typed primitive access
#[derive(Debug, Clone)]
pub struct ByteCursor<B> {
    inner: Cursor<B>,
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    /// Create a cursor positioned at the start of `buffer`
    pub fn new(buffer: B) -> Self {
        Self {
            inner: Cursor::new(buffer),
        }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.inner.get_ref().as_ref().len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left between the current offset and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    /// Underlying buffer
    pub fn get_ref(&self) -> &[u8] {
        self.inner.get_ref().as_ref()
    }

    /// Move to an absolute offset (the end of the buffer is a valid target)
    pub fn seek(&mut self, offset: usize) -> FormatResult<()> {
        if offset > self.len() {
            return Err(FormatError::OutOfRange {
                offset,
                requested: 0,
                available: 0,
            });
        }
        self.inner.set_position(offset as u64);
        Ok(())
    }

    /// Advance by `count` bytes
    pub fn skip(&mut self, count: usize) -> FormatResult<()> {
        self.ensure(count)?;
        self.inner.set_position((self.position() + count) as u64);
        Ok(())
    }

    fn ensure(&self, requested: usize) -> FormatResult<()> {
        let available = self.remaining();
        if requested > available {
            return Err(FormatError::OutOfRange {
                offset: self.position(),
                requested,
                available,
            });
        }
        Ok(())
    }

    fn read_prim<V>(&mut self) -> FormatResult<V>
    where
        V: for<'a> BinRead<Args<'a> = ()>,
    {
        self.ensure(std::mem::size_of::<V>())?;
        Ok(V::read_options(&mut self.inner, Endian::Little, ())?)
    }

    /// Read a `u8`
    pub fn read_u8(&mut self) -> FormatResult<u8> {
        self.read_prim()
    }

    /// Read a little-endian `u16`
    pub fn read_u16(&mut self) -> FormatResult<u16> {
        self.read_prim()
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self) -> FormatResult<u32> {
        self.read_prim()
    }

    /// Read a little-endian `u64`
    pub fn read_u64(&mut self) -> FormatResult<u64> {
        self.read_prim()
    }

    /// Read a little-endian `f32`
    pub fn read_f32(&mut self) -> FormatResult<f32> {
        self.read_prim()
    }

    /// Read `count` raw bytes
    pub fn read_bytes(&mut self, count: usize) -> FormatResult<&[u8]> {
        self.ensure(count)?;
        let start = self.position();
        self.inner.set_position((start + count) as u64);
        Ok(&self.inner.get_ref().as_ref()[start..start + count])
    }

    /// Read a fixed-size byte array
    pub fn read_array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a four-byte tag
    pub fn read_tag(&mut self) -> FormatResult<[u8; 4]> {
        self.read_array()
    }

    /// Read a four-byte tag and require it to equal `expected`
    pub fn expect_tag(&mut self, expected: [u8; 4]) -> FormatResult<()> {
        let found = self.read_tag()?;
        if found != expected {
            return Err(FormatError::BadMagic { expected, found });
        }
        Ok(())
    }

    /// Read a binrw record of a known encoded size
    pub fn read_record<T>(&mut self, encoded_size: usize) -> FormatResult<T>
    where
        T: for<'a> BinRead<Args<'a> = ()>,
    {
        self.ensure(encoded_size)?;
        Ok(T::read_options(&mut self.inner, Endian::Little, ())?)
    }
}

impl ByteCursor<Vec<u8>> {
    /// Create an empty writer
    pub fn writer() -> Self {
        Self::new(Vec::new())
    }

    fn write_prim<V>(&mut self, value: V) -> FormatResult<()>
    where
        V: for<'a> BinWrite<Args<'a> = ()>,
    {
        value.write_options(&mut self.inner, Endian::Little, ())?;
        Ok(())
    }

    /// Write a `u8`
    pub fn write_u8(&mut self, value: u8) -> FormatResult<()> {
        self.write_prim(value)
    }

    /// Write a little-endian `u16`
    pub fn write_u16(&mut self, value: u16) -> FormatResult<()> {
        self.write_prim(value)
    }

    /// Write a little-endian `u32`
    pub fn write_u32(&mut self, value: u32) -> FormatResult<()> {
        self.write_prim(value)
    }

    /// Write a little-endian `u64`
    pub fn write_u64(&mut self, value: u64) -> FormatResult<()> {
        self.write_prim(value)
    }

    /// Write a little-endian `f32`
    pub fn write_f32(&mut self, value: f32) -> FormatResult<()> {
        self.write_prim(value)
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> FormatResult<()> {
        std::io::Write::write_all(&mut self.inner, bytes)?;
        Ok(())
    }

    /// Write a four-byte tag
    pub fn write_tag(&mut self, tag: [u8; 4]) -> FormatResult<()> {
        self.write_bytes(&tag)
    }

    /// Write a binrw record
    pub fn write_record<T>(&mut self, record: &T) -> FormatResult<()>
    where
        T: for<'a> BinWrite<Args<'a> = ()>,
    {
        record.write_options(&mut self.inner, Endian::Little, ())?;
        Ok(())
    }

    /// Emit a zeroed `u32` to be filled in later with [`Self::patch_u32`]
    pub fn reserve_u32(&mut self) -> FormatResult<PatchSlot> {
        let slot = PatchSlot {
            offset: self.position(),
        };
        self.write_u32(0)?;
        Ok(slot)
    }

    /// Overwrite a reserved field without moving the write position
    ///
    /// A slot that does not lie inside this buffer is `OutOfRange`.
    pub fn patch_u32(&mut self, slot: PatchSlot, value: u32) -> FormatResult<()> {
        if slot.offset.saturating_add(4) > self.len() {
            return Err(FormatError::OutOfRange {
                offset: slot.offset,
                requested: 4,
                available: self.len().saturating_sub(slot.offset),
            });
        }
        let resume = self.position();
        self.inner.set_position(slot.offset as u64);
        self.write_u32(value)?;
        self.inner.set_position(resume as u64);
        Ok(())
    }

    /// Consume the writer and return the buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}
