mod local;

pub use local::LocalFile;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Trait for random access reading from a data source
pub trait ReadAt {
    /// Read data at the specified offset into the buffer.
    ///
    /// Reads that start or run past the end of the source are short:
    /// the return value is the number of bytes actually copied, which
    /// is zero when `offset` lies beyond the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        if start >= self.len() {
            return 0;
        }
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        n
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Little-endian cursor over a [`ReadAt`] source.
///
/// The position is explicit and may be moved anywhere, including past
/// the end of the source. Strict reads fail with [`Error::Truncated`]
/// when the source runs out; lenient reads return whatever is left.
pub struct ByteReader<'a, R: ReadAt + ?Sized> {
    source: &'a R,
    pos: u64,
}

impl<'a, R: ReadAt + ?Sized> ByteReader<'a, R> {
    pub fn new(source: &'a R) -> Self {
        Self { source, pos: 0 }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Bytes between the cursor and the end of the source.
    pub fn remaining(&self) -> u64 {
        self.source.size().saturating_sub(self.pos)
    }

    pub fn read_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf, what)?;
        Ok(buf)
    }

    pub fn read_u16(&mut self, what: &'static str) -> Result<u16> {
        let buf = self.read_array::<2>(what)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    pub fn read_u32(&mut self, what: &'static str) -> Result<u32> {
        let buf = self.read_array::<4>(what)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    /// Read exactly `len` bytes.
    pub fn read_vec(&mut self, len: usize, what: &'static str) -> Result<Vec<u8>> {
        if (len as u64) > self.remaining() {
            return Err(self.truncated(what, len));
        }
        let mut buf = vec![0u8; len];
        self.fill(&mut buf, what)?;
        Ok(buf)
    }

    /// Read at most `len` bytes; a cursor at or past the end yields an empty buffer.
    pub fn read_up_to(&mut self, len: u64) -> Vec<u8> {
        let len = len.min(self.remaining());
        let mut buf = vec![0u8; len as usize];
        let n = self.source.read_at(self.pos, &mut buf);
        buf.truncate(n);
        self.pos += n as u64;
        buf
    }

    /// Read a NUL-terminated byte string, consuming the terminator.
    ///
    /// Returns the bytes read so far and `false` if the source ended first.
    pub fn read_cstr(&mut self) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if self.source.read_at(self.pos, &mut byte) == 0 {
                return (out, false);
            }
            self.pos += 1;
            if byte[0] == 0 {
                return (out, true);
            }
            out.push(byte[0]);
        }
    }

    fn fill(&mut self, buf: &mut [u8], what: &'static str) -> Result<()> {
        let n = self.source.read_at(self.pos, buf);
        if n != buf.len() {
            return Err(self.truncated(what, buf.len()));
        }
        self.pos += n as u64;
        Ok(())
    }

    fn truncated(&self, what: &'static str, needed: usize) -> Error {
        Error::Truncated {
            what,
            offset: self.pos,
            needed,
        }
    }
}
