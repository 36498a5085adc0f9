//! Length-prefixed UTF-8: Int32 byte length, then the bytes.

use crate::cursor::Cursor;
use crate::descriptor::Kind;
use crate::error::CodecError;
use crate::primitive;

/// Write a big-endian Int32 length or count prefix.
pub(crate) fn write_len(kind: Kind, len: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let len = i32::try_from(len).map_err(|_| CodecError::LimitExceeded {
        kind,
        len,
        limit: i32::MAX as usize,
    })?;
    primitive::write_i32(out, len);
    Ok(())
}

/// Read an Int32 length or count prefix, rejecting negatives and values over
/// `limit` (0 = unlimited).
pub(crate) fn read_len(
    kind: Kind,
    limit: usize,
    cursor: &mut Cursor<'_>,
) -> Result<usize, CodecError> {
    let offset = cursor.position();
    let len = primitive::read_i32(cursor)?;
    let len = usize::try_from(len).map_err(|_| CodecError::NegativeLength { kind, len, offset })?;
    if limit > 0 && len > limit {
        return Err(CodecError::LimitExceeded { kind, len, limit });
    }
    Ok(len)
}

pub fn encode(s: &str, out: &mut Vec<u8>) -> Result<(), CodecError> {
    write_len(Kind::String, s.len(), out)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Decode a length-prefixed string. `max_len` of 0 means unlimited.
pub fn decode(cursor: &mut Cursor<'_>, max_len: usize) -> Result<String, CodecError> {
    let len = read_len(Kind::String, max_len, cursor)?;
    let offset = cursor.position();
    let bytes = cursor.take(len)?;
    let s = std::str::from_utf8(bytes)
        .map_err(|source| CodecError::InvalidEncoding { offset, source })?;
    Ok(s.to_string())
}
