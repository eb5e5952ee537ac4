//! Cursor types for reading and writing byte buffers.
//!
//! [`Reader`] is a position-tracking view over a byte slice. The formats
//! handled here store displacements rather than lengths, so decoding has to
//! jump around the buffer; [`Reader::scoped`] makes those jumps safe by
//! restoring the cursor on every exit path.
//!
//! [`Sink`] is the write-side counterpart. [`VecSink`] builds a real buffer,
//! [`CountingSink`] only advances a counter, which is how dry-run sizing of a
//! full re-encode works.

use crate::{Error, Result};

/// A binary reader over a byte slice with an absolute cursor.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    /// Create a new reader at position 0.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Current absolute position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes left to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Whether the cursor is at or past the end.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Read `count` bytes and advance the cursor.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian i16.
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Read a little-endian i64.
    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.read_bytes(8)?;
        Ok(i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Read a little-endian f32.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian f64.
    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.read_bytes(8)?;
        Ok(f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Read a null-terminated string, consuming the terminator.
    ///
    /// Fails with [`Error::UnterminatedString`] if no terminator exists
    /// before the end of the buffer.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let start = self.position;
        let rest = &self.data[start.min(self.data.len())..];
        let nul = memchr::memchr(0, rest).ok_or(Error::UnterminatedString { at: start as u64 })?;
        self.position = start + nul + 1;
        std::str::from_utf8(&rest[..nul]).map_err(Error::Utf8)
    }

    /// Run `f` with the cursor moved to `target`, then restore the cursor.
    ///
    /// The restore happens on both success and failure, so out-of-line
    /// decoding never disturbs sequential decoding of sibling fields.
    pub fn scoped<T>(
        &mut self,
        target: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.position;
        self.position = target;
        let result = f(self);
        self.position = saved;
        result
    }
}

/// Write-side cursor abstraction used by the encoders.
pub trait Sink {
    /// Current absolute output position.
    fn position(&self) -> usize;

    /// Append bytes at the current position.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Overwrite previously written bytes at an absolute position.
    ///
    /// Used by the two-pass address resolution to fill pointer placeholders.
    fn patch_at(&mut self, at: usize, bytes: &[u8]) -> Result<()>;
}

/// A [`Sink`] backed by a growable byte buffer.
#[derive(Debug, Default)]
pub struct VecSink {
    buf: Vec<u8>,
}

impl VecSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the sink and return the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Borrow the written bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Sink for VecSink {
    #[inline]
    fn position(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn patch_at(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        let end = at.checked_add(bytes.len()).unwrap_or(usize::MAX);
        if end > self.buf.len() {
            return Err(Error::PatchRange {
                at,
                len: bytes.len(),
                written: self.buf.len(),
            });
        }
        self.buf[at..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// A [`Sink`] that discards bytes and only tracks the output position.
///
/// Running an encode against this computes the final size and exercises the
/// whole address-resolution machinery without touching any real buffer.
#[derive(Debug, Default)]
pub struct CountingSink {
    position: usize,
}

impl CountingSink {
    /// Create a sink at position 0.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for CountingSink {
    #[inline]
    fn position(&self) -> usize {
        self.position
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.position += bytes.len();
        Ok(())
    }

    fn patch_at(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        let end = at.checked_add(bytes.len()).unwrap_or(usize::MAX);
        if end > self.position {
            return Err(Error::PatchRange {
                at,
                len: bytes.len(),
                written: self.position,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0xFF, 0xFF];
        let mut reader = Reader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_i16().unwrap(), -1);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_cstring() {
        let data = b"hello\0world\0";
        let mut reader = Reader::new(data);

        assert_eq!(reader.read_cstring().unwrap(), "hello");
        assert_eq!(reader.read_cstring().unwrap(), "world");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_unterminated_cstring() {
        let mut reader = Reader::new(b"nope");
        assert!(matches!(
            reader.read_cstring(),
            Err(Error::UnterminatedString { at: 0 })
        ));
    }

    #[test]
    fn test_scoped_restores_cursor() {
        let data = [0u8; 16];
        let mut reader = Reader::new(&data);
        reader.read_u32().unwrap();

        let v = reader.scoped(12, |r| r.read_u32()).unwrap();
        assert_eq!(v, 0);
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_scoped_restores_cursor_on_error() {
        let data = [0u8; 8];
        let mut reader = Reader::new(&data);
        reader.read_u16().unwrap();

        assert!(reader.scoped(6, |r| r.read_u32()).is_err());
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_vec_sink_patch() {
        let mut sink = VecSink::new();
        sink.write(&[0, 0, 0, 0]).unwrap();
        sink.patch_at(1, &[0xAA, 0xBB]).unwrap();
        assert_eq!(sink.bytes(), &[0, 0xAA, 0xBB, 0]);
        assert!(sink.patch_at(3, &[1, 1]).is_err());
    }

    #[test]
    fn test_counting_sink() {
        let mut sink = CountingSink::new();
        sink.write(&[1, 2, 3]).unwrap();
        sink.write(&[4]).unwrap();
        assert_eq!(sink.position(), 4);
        assert!(sink.patch_at(0, &[9, 9]).is_ok());
        assert!(sink.patch_at(3, &[9, 9]).is_err());
    }
}
