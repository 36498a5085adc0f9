//! Recursive traversal over descriptors: List, Map and Record on top of the
//! primitive and string codecs.
//!
//! Encode and decode walk the descriptor depth-first in the same order, so
//! the decoder consumes bytes exactly as the encoder emitted them.

use std::collections::HashMap;
use std::collections::hash_map::{Entry, RandomState};
use std::hash::{BuildHasher, Hasher};

use crate::codec::CodecOptions;
use crate::cursor::Cursor;
use crate::descriptor::{Descriptor, Kind, RecordDescriptor};
use crate::error::CodecError;
use crate::value::Value;
use crate::{primitive, string};

pub(crate) fn encode_into(
    value: &Value,
    descriptor: &Descriptor,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    match descriptor {
        Descriptor::Boolean | Descriptor::Int32 | Descriptor::Int64 | Descriptor::Double => {
            primitive::encode(descriptor.kind(), value, out)
        }
        Descriptor::String => match value {
            Value::String(s) => string::encode(s, out),
            other => Err(CodecError::mismatch(Kind::String, other.type_name())),
        },
        Descriptor::List(element) => {
            let Value::List(items) = value else {
                return Err(CodecError::mismatch(descriptor, value.type_name()));
            };
            check_width(descriptor, items.len(), element.min_encoded_len())?;
            string::write_len(Kind::List, items.len(), out)?;
            for (i, item) in items.iter().enumerate() {
                encode_into(item, element, out)
                    .map_err(|e| e.with_context(format_args!("[{i}]")))?;
            }
            Ok(())
        }
        Descriptor::Map(key_desc, value_desc) => {
            let Value::Map(entries) = value else {
                return Err(CodecError::mismatch(descriptor, value.type_name()));
            };
            let width = key_desc.min_encoded_len() + value_desc.min_encoded_len();
            check_width(descriptor, entries.len(), width)?;
            string::write_len(Kind::Map, entries.len(), out)?;
            for (i, (k, v)) in entries.iter().enumerate() {
                encode_into(k, key_desc, out)
                    .map_err(|e| e.with_context(format_args!("[{i}].key")))?;
                encode_into(v, value_desc, out)
                    .map_err(|e| e.with_context(format_args!("[{i}]")))?;
            }
            Ok(())
        }
        Descriptor::Record(record) => {
            let fields = record_fields(record, value)?;
            for (field, (_, v)) in record.fields().iter().zip(fields) {
                encode_into(v, &field.descriptor, out).map_err(|e| e.with_context(&field.name))?;
            }
            Ok(())
        }
    }
}

/// Exact encoded size of `value`, with the same validation as [`encode_into`].
pub(crate) fn encoded_len(value: &Value, descriptor: &Descriptor) -> Result<usize, CodecError> {
    match descriptor {
        Descriptor::Boolean | Descriptor::Int32 | Descriptor::Int64 | Descriptor::Double => {
            let kind = descriptor.kind();
            match (kind, value) {
                (Kind::Boolean, Value::Bool(_))
                | (Kind::Int32, Value::Int32(_))
                | (Kind::Int64, Value::Int64(_))
                | (Kind::Double, Value::Double(_))
                | (_, Value::Null) => Ok(kind.fixed_width().unwrap_or_default()),
                (kind, other) => Err(CodecError::mismatch(kind, other.type_name())),
            }
        }
        Descriptor::String => match value {
            Value::String(s) => Ok(4 + s.len()),
            other => Err(CodecError::mismatch(Kind::String, other.type_name())),
        },
        Descriptor::List(element) => {
            let Value::List(items) = value else {
                return Err(CodecError::mismatch(descriptor, value.type_name()));
            };
            check_width(descriptor, items.len(), element.min_encoded_len())?;
            items.iter().enumerate().try_fold(4, |acc, (i, item)| {
                encoded_len(item, element)
                    .map(|n| acc + n)
                    .map_err(|e| e.with_context(format_args!("[{i}]")))
            })
        }
        Descriptor::Map(key_desc, value_desc) => {
            let Value::Map(entries) = value else {
                return Err(CodecError::mismatch(descriptor, value.type_name()));
            };
            let width = key_desc.min_encoded_len() + value_desc.min_encoded_len();
            check_width(descriptor, entries.len(), width)?;
            entries
                .iter()
                .enumerate()
                .try_fold(4, |acc, (i, (k, v))| -> Result<usize, CodecError> {
                    let k = encoded_len(k, key_desc)
                        .map_err(|e| e.with_context(format_args!("[{i}].key")))?;
                    let v = encoded_len(v, value_desc)
                        .map_err(|e| e.with_context(format_args!("[{i}]")))?;
                    Ok(acc + k + v)
                })
        }
        Descriptor::Record(record) => {
            let fields = record_fields(record, value)?;
            record.fields().iter().zip(fields).try_fold(0, |acc, (field, (_, v))| {
                encoded_len(v, &field.descriptor)
                    .map(|n| acc + n)
                    .map_err(|e| e.with_context(&field.name))
            })
        }
    }
}

/// Reject a non-empty List or Map whose elements occupy no bytes: the count
/// alone would drive the decode loop with nothing in the buffer to bound it.
fn check_width(descriptor: &Descriptor, count: usize, width: usize) -> Result<(), CodecError> {
    if count > 0 && width == 0 {
        return Err(CodecError::unsupported(format!(
            "'{descriptor}': elements encode to zero bytes"
        )));
    }
    Ok(())
}

/// Check that a record value lines up with its descriptor, field by field.
fn record_fields<'v>(
    record: &RecordDescriptor,
    value: &'v Value,
) -> Result<&'v [(String, Value)], CodecError> {
    let Value::Record(fields) = value else {
        return Err(CodecError::mismatch(record.name(), value.type_name()));
    };
    if fields.len() != record.fields().len() {
        return Err(CodecError::mismatch(
            format_args!("{} with {} fields", record.name(), record.fields().len()),
            format_args!("record with {} fields", fields.len()),
        ));
    }
    for (expected, (name, _)) in record.fields().iter().zip(fields) {
        if expected.name != *name {
            return Err(CodecError::mismatch(
                format_args!("field '{}'", expected.name),
                format_args!("field '{name}'"),
            )
            .with_context(record.name()));
        }
    }
    Ok(fields.as_slice())
}

pub(crate) fn decode_from(
    descriptor: &Descriptor,
    cursor: &mut Cursor<'_>,
    options: &CodecOptions,
) -> Result<Value, CodecError> {
    match descriptor {
        Descriptor::Boolean | Descriptor::Int32 | Descriptor::Int64 | Descriptor::Double => {
            primitive::decode(descriptor.kind(), cursor)
        }
        Descriptor::String => string::decode(cursor, options.max_string_len).map(Value::String),
        Descriptor::List(element) => {
            let count = string::read_len(Kind::List, options.max_sequence_len, cursor)?;
            let width = element.min_encoded_len();
            check_width(descriptor, count, width)?;
            let mut items = Vec::with_capacity(count.min(cursor.remaining() / width.max(1)));
            for i in 0..count {
                let item = decode_from(element, cursor, options)
                    .map_err(|e| e.with_context(format_args!("[{i}]")))?;
                items.push(item);
            }
            Ok(Value::List(items))
        }
        Descriptor::Map(key_desc, value_desc) => {
            decode_map(descriptor, key_desc, value_desc, cursor, options)
        }
        Descriptor::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields().len());
            for field in record.fields() {
                let value = decode_from(&field.descriptor, cursor, options)
                    .map_err(|e| e.with_context(&field.name))?;
                fields.push((field.name.clone(), value));
            }
            Ok(Value::Record(fields))
        }
    }
}

/// Map decode with the abort-to-null rule: an absent or damaged key or value
/// makes the whole map `Null`. Duplicate keys keep the first occurrence.
fn decode_map(
    descriptor: &Descriptor,
    key_desc: &Descriptor,
    value_desc: &Descriptor,
    cursor: &mut Cursor<'_>,
    options: &CodecOptions,
) -> Result<Value, CodecError> {
    let count = string::read_len(Kind::Map, options.max_sequence_len, cursor)?;
    let width = key_desc.min_encoded_len() + value_desc.min_encoded_len();
    check_width(descriptor, count, width)?;

    let capacity = count.min(cursor.remaining() / width.max(1));
    let mut entries: Vec<(Value, Value)> = Vec::with_capacity(capacity);
    let mut seen = KeyIndex::with_capacity(capacity);
    for i in 0..count {
        let Some(key) = absorb(decode_from(key_desc, cursor, options), i, cursor)? else {
            return Ok(Value::Null);
        };
        let Some(value) = absorb(decode_from(value_desc, cursor, options), i, cursor)? else {
            return Ok(Value::Null);
        };
        if seen.contains_or_insert(&key, &entries) {
            tracing::trace!(entry = i, offset = cursor.position(), "duplicate map key skipped");
            continue;
        }
        entries.push((key, value));
    }
    Ok(Value::Map(entries))
}

/// `Ok(None)` when the entry part is absent or its bytes are damaged;
/// structural errors propagate.
fn absorb(
    result: Result<Value, CodecError>,
    entry: usize,
    cursor: &mut Cursor<'_>,
) -> Result<Option<Value>, CodecError> {
    match result {
        Ok(Value::Null) => {
            tracing::debug!(
                entry,
                offset = cursor.position(),
                "absent map entry, map decodes as null"
            );
            cursor.mark_absorbed();
            Ok(None)
        }
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_absorbable() => {
            tracing::debug!(
                entry,
                offset = cursor.position(),
                error = %e,
                "damaged map entry, map decodes as null"
            );
            cursor.mark_absorbed();
            Ok(None)
        }
        Err(e) => Err(e.with_context(format_args!("[{entry}]"))),
    }
}

/// Hash index from map keys to their position in the entry list.
///
/// A hash collision between unequal keys falls back to a scan of the
/// entries. Keys containing NaN are never indexed: they equal nothing.
struct KeyIndex {
    hasher: RandomState,
    slots: HashMap<u64, usize>,
}

impl KeyIndex {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            hasher: RandomState::new(),
            slots: HashMap::with_capacity(capacity),
        }
    }

    /// `true` if `key` is already among `entries`; otherwise records it as
    /// the next entry to be pushed.
    fn contains_or_insert(&mut self, key: &Value, entries: &[(Value, Value)]) -> bool {
        let mut state = self.hasher.build_hasher();
        if !key.hash_key(&mut state) {
            return false;
        }
        match self.slots.entry(state.finish()) {
            Entry::Occupied(slot) => {
                entries[*slot.get()].0 == *key || entries.iter().any(|(k, _)| k == key)
            }
            Entry::Vacant(slot) => {
                slot.insert(entries.len());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldDescriptor;
    use crate::error::ErrorKind;

    fn decode(descriptor: &Descriptor, buf: &[u8]) -> Result<Value, CodecError> {
        decode_from(descriptor, &mut Cursor::new(buf), &CodecOptions::default())
    }

    fn encode(value: &Value, descriptor: &Descriptor) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(value, descriptor, &mut out).unwrap();
        assert_eq!(encoded_len(value, descriptor).unwrap(), out.len());
        out
    }

    fn pair() -> Descriptor {
        Descriptor::record(
            "Pair",
            vec![
                FieldDescriptor::new("a", Descriptor::Int32),
                FieldDescriptor::new("b", Descriptor::String),
            ],
        )
    }

    #[test]
    fn record_layout_is_positional() {
        let v = Value::Record(vec![
            ("a".to_string(), Value::Int32(1)),
            ("b".to_string(), "x".into()),
        ]);
        assert_eq!(encode(&v, &pair()), [0, 0, 0, 1, 0, 0, 0, 1, 0x78]);
    }

    #[test]
    fn list_keeps_order() {
        let d = Descriptor::list(Descriptor::Int32);
        let v = Value::List(vec![Value::Int32(3), Value::Int32(1), Value::Int32(2)]);
        let bytes = encode(&v, &d);
        assert_eq!(&bytes[..4], &[0, 0, 0, 3]);
        assert_eq!(decode(&d, &bytes).unwrap(), v);
    }

    #[test]
    fn map_duplicate_key_first_wins() {
        let d = Descriptor::map(Descriptor::Int32, Descriptor::String);
        let mut buf = vec![0, 0, 0, 2];
        buf.extend_from_slice(&[0, 0, 0, 7, 0, 0, 0, 1, b'a']);
        buf.extend_from_slice(&[0, 0, 0, 7, 0, 0, 0, 1, b'b']);
        assert_eq!(decode(&d, &buf).unwrap(), Value::Map(vec![(Value::Int32(7), "a".into())]));
    }

    #[test]
    fn map_damaged_entry_yields_null() {
        let d = Descriptor::map(Descriptor::Int32, Descriptor::String);
        let mut buf = vec![0, 0, 0, 2];
        buf.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, b'a']);
        buf.extend_from_slice(&[0, 0, 0, 2, 0, 0, 0, 9, b'b']);
        assert_eq!(decode(&d, &buf).unwrap(), Value::Null);
    }

    #[test]
    fn nested_null_map_propagates_to_outer_map() {
        let inner = Descriptor::map(Descriptor::Int32, Descriptor::Int32);
        let d = Descriptor::map(Descriptor::String, inner);
        let mut buf = vec![0, 0, 0, 1];
        buf.extend_from_slice(&[0, 0, 0, 1, b'k']);
        // inner map claims one entry but has no bytes
        buf.extend_from_slice(&[0, 0, 0, 1]);
        assert_eq!(decode(&d, &buf).unwrap(), Value::Null);
    }

    #[test]
    fn truncated_map_count_is_raised() {
        let d = Descriptor::map(Descriptor::Int32, Descriptor::Int32);
        let err = decode(&d, &[0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedBuffer);
    }

    #[test]
    fn limit_inside_map_is_raised() {
        let d = Descriptor::map(Descriptor::Int32, Descriptor::String);
        let mut buf = vec![0, 0, 0, 1, 0, 0, 0, 1];
        buf.extend_from_slice(&[0, 0, 0, 3, b'a', b'b', b'c']);
        let options = CodecOptions {
            max_string_len: 2,
            ..CodecOptions::default()
        };
        let err = decode_from(&d, &mut Cursor::new(&buf), &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
        assert_eq!(err.path(), Some("[0]"));
    }

    #[test]
    fn error_path_points_at_field() {
        let d = Descriptor::record(
            "Book",
            vec![FieldDescriptor::new("levels", Descriptor::list(pair()))],
        );
        let mut buf = vec![0, 0, 0, 2];
        buf.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, b'x']);
        buf.extend_from_slice(&[0, 0, 0, 2, 0, 0, 0, 5]);
        let err = decode(&d, &buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedBuffer);
        assert_eq!(err.path(), Some("levels[1].b"));
    }

    #[test]
    fn record_value_must_match_field_names() {
        let v = Value::Record(vec![
            ("a".to_string(), Value::Int32(1)),
            ("c".to_string(), "x".into()),
        ]);
        let err = encode_into(&v, &pair(), &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let short = Value::Record(vec![("a".to_string(), Value::Int32(1))]);
        assert_eq!(encoded_len(&short, &pair()).unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn null_string_is_rejected() {
        let err = encode_into(&Value::Null, &Descriptor::String, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn negative_list_count() {
        let d = Descriptor::list(Descriptor::Boolean);
        let err = decode(&d, &[0x80, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn large_map_keeps_first_of_each_key() {
        let d = Descriptor::map(Descriptor::Int32, Descriptor::Int32);
        let n = 100_000i32;
        let mut buf = Vec::with_capacity(4 + 8 * (n as usize + 2));
        buf.extend_from_slice(&(n + 2).to_be_bytes());
        for k in 0..n {
            buf.extend_from_slice(&k.to_be_bytes());
            buf.extend_from_slice(&k.wrapping_mul(3).to_be_bytes());
        }
        // repeats of the first and last keys
        for k in [0, n - 1] {
            buf.extend_from_slice(&k.to_be_bytes());
            buf.extend_from_slice(&(-1i32).to_be_bytes());
        }

        let Value::Map(entries) = decode(&d, &buf).unwrap() else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), n as usize);
        assert_eq!(entries[0], (Value::Int32(0), Value::Int32(0)));
        assert_eq!(
            entries[n as usize - 1],
            (Value::Int32(n - 1), Value::Int32((n - 1) * 3))
        );
    }

    #[test]
    fn map_double_keys_follow_value_equality() {
        let d = Descriptor::map(Descriptor::Double, Descriptor::Boolean);
        let mut buf = vec![0, 0, 0, 4];
        for (k, v) in [(0.0f64, 1u8), (-0.0, 0), (f64::NAN, 1), (f64::NAN, 0)] {
            buf.extend_from_slice(&k.to_be_bytes());
            buf.push(v);
        }
        let Value::Map(entries) = decode(&d, &buf).unwrap() else {
            panic!("expected map");
        };
        // -0.0 repeats 0.0; NaN never equals an earlier NaN
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (Value::Double(0.0), Value::Bool(true)));
        assert!(entries[1..].iter().all(|(k, _)| matches!(k, Value::Double(d) if d.is_nan())));
    }

    #[test]
    fn absorbed_map_marks_cursor() {
        let d = Descriptor::map(Descriptor::Int32, Descriptor::String);
        let mut buf = vec![0, 0, 0, 1];
        buf.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 9, b'a']);
        let mut cursor = Cursor::new(&buf);
        let value = decode_from(&d, &mut cursor, &CodecOptions::default()).unwrap();
        assert_eq!(value, Value::Null);
        assert!(cursor.absorbed());
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn zero_width_elements_are_unsupported() {
        let empty = Descriptor::record("Empty", vec![]);
        let list = Descriptor::list(empty.clone());
        let err = decode(&list, &[0x7f, 0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(decode(&list, &[0, 0, 0, 0]).unwrap(), Value::List(vec![]));

        let map = Descriptor::map(empty.clone(), empty.clone());
        let err = decode(&map, &[0, 0, 0, 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);

        let one = Value::List(vec![Value::Record(vec![])]);
        let err = encode_into(&one, &list, &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(encoded_len(&one, &list).unwrap_err().kind(), ErrorKind::UnsupportedType);

        // a zero-width key next to a sized value still consumes bytes
        let keyed = Descriptor::map(empty, Descriptor::Int32);
        let buf = [0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2];
        let expected = Value::Map(vec![(Value::Record(vec![]), Value::Int32(1))]);
        assert_eq!(decode(&keyed, &buf).unwrap(), expected);
    }
}
