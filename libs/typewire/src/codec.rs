use crate::composite;
use crate::cursor::Cursor;
use crate::descriptor::Descriptor;
use crate::error::CodecError;
use crate::value::Value;
use crate::wire::Wire;

/// Decode bounds and strictness.
///
/// Deserialized with defaults for missing keys, e.g. from the `[options]`
/// table of a registry config.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// Maximum string byte length accepted on decode (0 = unlimited).
    pub max_string_len: usize,

    /// Maximum list or map count accepted on decode (0 = unlimited).
    pub max_sequence_len: usize,

    /// Accept bytes left over after the top-level value.
    pub allow_trailing_bytes: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            max_string_len: 0,
            max_sequence_len: 0,
            allow_trailing_bytes: true,
        }
    }
}

/// Stateless encoder/decoder. Each decode call owns its own [`Cursor`], so a
/// single `Codec` can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    options: CodecOptions,
}

impl Codec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn encode_value(
        &self,
        value: &Value,
        descriptor: &Descriptor,
    ) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(composite::encoded_len(value, descriptor)?);
        composite::encode_into(value, descriptor, &mut out)?;
        tracing::trace!(ty = %descriptor, bytes = out.len(), "encoded");
        Ok(out)
    }

    /// Decode one value of `descriptor` from `bytes`.
    ///
    /// With `allow_trailing_bytes` off, leftover bytes are an error unless a
    /// map stopped early on a damaged entry: the rest of the buffer is then
    /// unread by design and the absent map is the result.
    pub fn decode_value(&self, bytes: &[u8], descriptor: &Descriptor) -> Result<Value, CodecError> {
        let mut cursor = Cursor::new(bytes);
        let value = composite::decode_from(descriptor, &mut cursor, &self.options)?;
        let remaining = cursor.remaining();
        if remaining > 0 {
            if cursor.absorbed() {
                tracing::trace!(ty = %descriptor, remaining, "bytes left after absorbed map entry");
            } else if !self.options.allow_trailing_bytes {
                tracing::debug!(ty = %descriptor, remaining, "rejecting trailing bytes");
                return Err(CodecError::TrailingBytes { remaining });
            } else {
                tracing::trace!(ty = %descriptor, remaining, "ignoring trailing bytes");
            }
        }
        tracing::trace!(ty = %descriptor, bytes = cursor.position(), "decoded");
        Ok(value)
    }

    /// Exact size `encode_value` would produce, without encoding.
    pub fn encoded_len(
        &self,
        value: &Value,
        descriptor: &Descriptor,
    ) -> Result<usize, CodecError> {
        composite::encoded_len(value, descriptor)
    }

    pub fn encode<T: Wire>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.encode_value(&value.to_value(), &T::descriptor())
    }

    pub fn decode<T: Wire>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        T::from_value(self.decode_value(bytes, &T::descriptor())?)
    }
}

/// Encode a typed value with default options.
pub fn encode<T: Wire>(value: &T) -> Result<Vec<u8>, CodecError> {
    Codec::default().encode(value)
}

/// Decode a typed value with default options.
pub fn decode<T: Wire>(bytes: &[u8]) -> Result<T, CodecError> {
    Codec::default().decode(bytes)
}

/// Encode a dynamic value against a descriptor with default options.
pub fn encode_value(value: &Value, descriptor: &Descriptor) -> Result<Vec<u8>, CodecError> {
    Codec::default().encode_value(value, descriptor)
}

/// Decode a dynamic value against a descriptor with default options.
pub fn decode_value(bytes: &[u8], descriptor: &Descriptor) -> Result<Value, CodecError> {
    Codec::default().decode_value(bytes, descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: CodecOptions = serde_json::from_str(r#"{"max_string_len": 64}"#).unwrap();
        assert_eq!(opts.max_string_len, 64);
        assert_eq!(opts.max_sequence_len, 0);
        assert!(opts.allow_trailing_bytes);
    }

    #[test]
    fn trailing_bytes_policy() {
        let bytes = [0, 0, 0, 5, 0xaa];
        assert_eq!(decode_value(&bytes, &Descriptor::Int32).unwrap(), Value::Int32(5));

        let strict = Codec::new(CodecOptions {
            allow_trailing_bytes: false,
            ..CodecOptions::default()
        });
        let err = strict.decode_value(&bytes, &Descriptor::Int32).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert!(matches!(err, CodecError::TrailingBytes { remaining: 1 }));
    }

    #[test]
    fn strict_mode_still_returns_absent_map() {
        // count 2; second value claims 200 bytes with only 2 left
        let mut bytes = vec![0, 0, 0, 2];
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, b'a']);
        bytes.extend_from_slice(&[0, 0, 0, 2, 0, 0, 0, 200, b'b', b'c']);
        let d = Descriptor::map(Descriptor::Int32, Descriptor::String);

        let strict = Codec::new(CodecOptions {
            allow_trailing_bytes: false,
            ..CodecOptions::default()
        });
        assert_eq!(strict.decode_value(&bytes, &d).unwrap(), Value::Null);
        assert_eq!(decode_value(&bytes, &d).unwrap(), Value::Null);

        // an intact map followed by junk is still rejected
        let mut intact = encode_value(&Value::Map(vec![]), &d).unwrap();
        intact.push(0);
        let err = strict.decode_value(&intact, &d).unwrap_err();
        assert!(matches!(err, CodecError::TrailingBytes { remaining: 1 }));
    }

    #[test]
    fn sequence_limit() {
        let codec = Codec::new(CodecOptions {
            max_sequence_len: 2,
            ..CodecOptions::default()
        });
        let d = Descriptor::list(Descriptor::Boolean);
        let bytes = encode_value(&Value::List(vec![true.into(); 3]), &d).unwrap();
        let err = codec.decode_value(&bytes, &d).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[test]
    fn typed_entry_points() {
        let bytes = encode(&vec![3i32, 1, 2]).unwrap();
        assert_eq!(bytes, [0, 0, 0, 3, 0, 0, 0, 3, 0, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(decode::<Vec<i32>>(&bytes).unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn encoded_len_matches() {
        let d = Descriptor::map(Descriptor::String, Descriptor::Double);
        let v = Value::Map(vec![("héllo".into(), Value::Double(1.5))]);
        let codec = Codec::default();
        assert_eq!(codec.encoded_len(&v, &d).unwrap(), 4 + 4 + 6 + 8);
        assert_eq!(codec.encode_value(&v, &d).unwrap().len(), 22);
    }
}
