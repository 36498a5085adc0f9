use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::descriptor::{Descriptor, Kind};
use crate::error::CodecError;
use crate::value::Value;

/// A Rust type with a statically known wire shape.
///
/// Implemented for `bool`, `i32`, `i64`, `f64`, `String`, `Vec<T>`,
/// `HashMap<K, V>`, `BTreeMap<K, V>`, `Option<T>`, and any struct with
/// `#[derive(Record)]`.
///
/// `Option<T>` shares `T`'s descriptor: nullability is not on the wire. A
/// `None` scalar encodes as zeros and decodes back as `Some(0)`; a map that
/// decodes as absent becomes `None`.
pub trait Wire: Sized {
    fn descriptor() -> Descriptor;
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

macro_rules! impl_scalar {
    ($ty:ty, $desc:ident, $variant:ident) => {
        impl Wire for $ty {
            fn descriptor() -> Descriptor {
                Descriptor::$desc
            }

            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(CodecError::mismatch(Kind::$desc, other.type_name())),
                }
            }
        }
    };
}

impl_scalar!(bool, Boolean, Bool);
impl_scalar!(i32, Int32, Int32);
impl_scalar!(i64, Int64, Int64);
impl_scalar!(f64, Double, Double);

impl Wire for String {
    fn descriptor() -> Descriptor {
        Descriptor::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(CodecError::mismatch(Kind::String, other.type_name())),
        }
    }
}

impl<T: Wire> Wire for Option<T> {
    fn descriptor() -> Descriptor {
        T::descriptor()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn descriptor() -> Descriptor {
        Descriptor::list(T::descriptor())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Wire::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    T::from_value(item).map_err(|e| e.with_context(format_args!("[{i}]")))
                })
                .collect(),
            other => Err(CodecError::mismatch(Self::descriptor(), other.type_name())),
        }
    }
}

/// Map entries into typed pairs, with the entry index as error context.
fn map_entries<K: Wire, V: Wire>(
    descriptor: impl FnOnce() -> Descriptor,
    value: Value,
) -> Result<impl Iterator<Item = Result<(K, V), CodecError>>, CodecError> {
    match value {
        Value::Map(entries) => Ok(entries.into_iter().enumerate().map(
            |(i, (k, v))| -> Result<(K, V), CodecError> {
                let k = K::from_value(k).map_err(|e| e.with_context(format_args!("[{i}].key")))?;
                let v = V::from_value(v).map_err(|e| e.with_context(format_args!("[{i}]")))?;
                Ok((k, v))
            },
        )),
        other => Err(CodecError::mismatch(descriptor(), other.type_name())),
    }
}

impl<K, V, S> Wire for HashMap<K, V, S>
where
    K: Wire + Eq + Hash,
    V: Wire,
    S: BuildHasher + Default,
{
    fn descriptor() -> Descriptor {
        Descriptor::map(K::descriptor(), V::descriptor())
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        map_entries(Self::descriptor, value)?.collect()
    }
}

impl<K, V> Wire for BTreeMap<K, V>
where
    K: Wire + Ord,
    V: Wire,
{
    fn descriptor() -> Descriptor {
        Descriptor::map(K::descriptor(), V::descriptor())
    }

    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        map_entries(Self::descriptor, value)?.collect()
    }
}

/// Field-by-field reader over a decoded record, used by `#[derive(Record)]`.
///
/// Fields must be read in descriptor order.
pub struct RecordFields {
    record: &'static str,
    fields: std::vec::IntoIter<(String, Value)>,
}

impl RecordFields {
    pub fn new(record: &'static str, value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Record(fields) => Ok(Self {
                record,
                fields: fields.into_iter(),
            }),
            other => Err(CodecError::mismatch(record, other.type_name())),
        }
    }

    pub fn next<T: Wire>(&mut self, field: &str) -> Result<T, CodecError> {
        match self.fields.next() {
            Some((name, value)) if name == field => {
                T::from_value(value).map_err(|e| e.with_context(field))
            }
            Some((name, _)) => Err(CodecError::mismatch(
                format_args!("field '{field}'"),
                format_args!("field '{name}'"),
            )
            .with_context(self.record)),
            None => Err(
                CodecError::mismatch(format_args!("field '{field}'"), "end of record")
                    .with_context(self.record),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn container_descriptors() {
        assert_eq!(
            <HashMap<String, Vec<i64>>>::descriptor().to_string(),
            "Map<String, List<Int64>>"
        );
        assert_eq!(<Option<f64>>::descriptor(), Descriptor::Double);
        assert_eq!(<BTreeMap<i32, bool>>::descriptor().to_string(), "Map<Int32, Boolean>");
    }

    #[test]
    fn option_maps_null() {
        assert_eq!(<Option<i32>>::from_value(Value::Null).unwrap(), None);
        assert_eq!(<Option<i32>>::from_value(Value::Int32(4)).unwrap(), Some(4));
        assert_eq!(None::<String>.to_value(), Value::Null);
    }

    #[test]
    fn null_into_plain_map_is_mismatch() {
        let err = <HashMap<i32, i32>>::from_value(Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn vec_error_carries_index() {
        let list = Value::List(vec![Value::Int32(1), "x".into()]);
        let err = <Vec<i32>>::from_value(list).unwrap_err();
        assert_eq!(err.path(), Some("[1]"));
    }

    #[test]
    fn record_fields_in_order() {
        let value = Value::Record(vec![
            ("a".to_string(), Value::Int32(1)),
            ("b".to_string(), "x".into()),
        ]);
        let mut fields = RecordFields::new("Pair", value).unwrap();
        assert_eq!(fields.next::<i32>("a").unwrap(), 1);
        let err = fields.next::<String>("c").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.path(), Some("Pair"));
    }
}
