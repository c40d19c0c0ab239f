//! Bounds-checked cursor over a borrowed byte buffer
//!
//! Every read checks `pos + width <= len` before touching the buffer and
//! advances the position by exactly the width read. Byte order is selected
//! per call through the `byteorder` marker types:
//!
//! ```
//! use byteorder::{BigEndian, LittleEndian};
//! use rainbow::cursor::ByteCursor;
//!
//! let bytes = [0x01, 0x02, 0x03, 0x04];
//! let mut cursor = ByteCursor::new(&bytes);
//! assert_eq!(cursor.read_u16::<BigEndian>()?, 0x0102);
//! assert_eq!(cursor.read_u16::<LittleEndian>()?, 0x0403);
//! assert_eq!(cursor.position(), 4);
//! # Ok::<(), rainbow::DecodeError>(())
//! ```

use byteorder::ByteOrder;

use crate::error::{DecodeError, Result};

/// Read position into an immutable byte buffer
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor at offset 0
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a cursor at an explicit offset
    ///
    /// Fails with `OutOfBounds` if `offset` lies past the end of the buffer.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        let mut cursor = Self::new(data);
        cursor.seek(offset)?;
        Ok(cursor)
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Length of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Move to an absolute offset (`offset == len` is allowed)
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(DecodeError::OutOfBounds {
                offset,
                width: 0,
                len: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Check that `width` bytes can be read from the current position
    pub fn ensure(&self, width: usize) -> Result<()> {
        match self.pos.checked_add(width) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(DecodeError::OutOfBounds {
                offset: self.pos,
                width,
                len: self.data.len(),
            }),
        }
    }

    /// Consume `width` bytes and return them
    pub fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        self.ensure(width)?;
        let bytes = &self.data[self.pos..self.pos + width];
        self.pos += width;
        Ok(bytes)
    }

    /// Advance past `width` uninterpreted bytes
    pub fn skip(&mut self, width: usize) -> Result<()> {
        self.take(width).map(|_| ())
    }

    /// Read an unsigned 16-bit integer
    pub fn read_u16<B: ByteOrder>(&mut self) -> Result<u16> {
        self.take(2).map(B::read_u16)
    }

    /// Read an unsigned 32-bit integer
    pub fn read_u32<B: ByteOrder>(&mut self) -> Result<u32> {
        self.take(4).map(B::read_u32)
    }

    /// Read a signed 16-bit integer
    pub fn read_i16<B: ByteOrder>(&mut self) -> Result<i16> {
        self.take(2).map(B::read_i16)
    }

    /// Read a signed 32-bit integer
    pub fn read_i32<B: ByteOrder>(&mut self) -> Result<i32> {
        self.take(4).map(B::read_i32)
    }

    /// Read an unsigned 64-bit integer
    pub fn read_u64<B: ByteOrder>(&mut self) -> Result<u64> {
        self.take(8).map(B::read_u64)
    }

    /// Read a 32-bit IEEE float
    pub fn read_f32<B: ByteOrder>(&mut self) -> Result<f32> {
        self.take(4).map(B::read_f32)
    }
}
