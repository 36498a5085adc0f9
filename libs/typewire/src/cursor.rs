use crate::error::CodecError;

/// Read position into a borrowed buffer, owned by a single decode operation.
///
/// Every successful read advances the offset by exactly the bytes consumed.
/// A failed read leaves the offset untouched.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    absorbed: bool,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            absorbed: false,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Whether a map decode stopped early on a damaged entry. Bytes after
    /// that point were never meant to be read.
    pub fn absorbed(&self) -> bool {
        self.absorbed
    }

    pub(crate) fn mark_absorbed(&mut self) {
        self.absorbed = true;
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(CodecError::TruncatedBuffer {
                offset: self.pos,
                needed: n,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read a fixed-size array, e.g. for `from_be_bytes`.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
