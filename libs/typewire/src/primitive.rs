//! Fixed-width scalars: Boolean (1), Int32 (4), Int64 (8), Double (8), all big-endian.

use crate::cursor::Cursor;
use crate::descriptor::Kind;
use crate::error::CodecError;
use crate::value::Value;

pub fn write_bool(out: &mut Vec<u8>, v: bool) {
    out.push(u8::from(v));
}

pub fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn write_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Any nonzero byte is `true`.
pub fn read_bool(cursor: &mut Cursor<'_>) -> Result<bool, CodecError> {
    let [b] = cursor.take_array::<1>()?;
    Ok(b != 0)
}

pub fn read_i32(cursor: &mut Cursor<'_>) -> Result<i32, CodecError> {
    Ok(i32::from_be_bytes(cursor.take_array()?))
}

pub fn read_i64(cursor: &mut Cursor<'_>) -> Result<i64, CodecError> {
    Ok(i64::from_be_bytes(cursor.take_array()?))
}

pub fn read_f64(cursor: &mut Cursor<'_>) -> Result<f64, CodecError> {
    Ok(f64::from_be_bytes(cursor.take_array()?))
}

/// Encode a scalar value for a fixed-width kind.
///
/// `Null` writes the kind's width in zero bytes, so an absent scalar reads
/// back as `false`, `0` or `0.0`.
pub fn encode(kind: Kind, value: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
    match (kind, value) {
        (Kind::Boolean, Value::Bool(v)) => write_bool(out, *v),
        (Kind::Int32, Value::Int32(v)) => write_i32(out, *v),
        (Kind::Int64, Value::Int64(v)) => write_i64(out, *v),
        (Kind::Double, Value::Double(v)) => write_f64(out, *v),
        (kind, Value::Null) => {
            let width = kind
                .fixed_width()
                .ok_or_else(|| CodecError::mismatch(kind, "null"))?;
            out.resize(out.len() + width, 0);
        }
        (kind, other) => return Err(CodecError::mismatch(kind, other.type_name())),
    }
    Ok(())
}

pub fn decode(kind: Kind, cursor: &mut Cursor<'_>) -> Result<Value, CodecError> {
    match kind {
        Kind::Boolean => read_bool(cursor).map(Value::Bool),
        Kind::Int32 => read_i32(cursor).map(Value::Int32),
        Kind::Int64 => read_i64(cursor).map(Value::Int64),
        Kind::Double => read_f64(cursor).map(Value::Double),
        other => Err(CodecError::mismatch("fixed-width scalar", other)),
    }
}
