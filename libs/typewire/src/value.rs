use std::hash::{Hash, Hasher};
use std::mem;

/// Dynamic value conforming to a [`Descriptor`](crate::descriptor::Descriptor).
///
/// Strategy by type:
/// - Scalars: stored natively.
/// - String: owned, always valid UTF-8.
/// - List, Map, Record: recursive, owned.
/// - Null: absent. Encodes as zero-fill for scalars; produced by decode only
///   when a map entry is absent or damaged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),

    /// Elements in wire order.
    List(Vec<Value>),
    /// Entries in insertion order. Keys are unique after decode.
    Map(Vec<(Value, Value)>),
    /// Named fields in descriptor order.
    Record(Vec<(String, Value)>),

    Null,
}

impl Value {
    /// Short variant name, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Boolean",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Record(_) => "Record",
            Value::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Look up a map entry by key.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Feed a hash consistent with `==` into `state`, for map-key lookup.
    ///
    /// Returns `false` if the value contains a NaN double: such a key is
    /// never equal to anything, itself included, so it has no usable hash.
    pub(crate) fn hash_key<H: Hasher>(&self, state: &mut H) -> bool {
        mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::Double(d) => {
                if d.is_nan() {
                    return false;
                }
                // -0.0 == 0.0
                let d = if *d == 0.0 { 0.0f64 } else { *d };
                d.to_bits().hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::List(items) => {
                items.len().hash(state);
                return items.iter().all(|item| item.hash_key(state));
            }
            Value::Map(entries) => {
                entries.len().hash(state);
                return entries
                    .iter()
                    .all(|(k, v)| k.hash_key(state) && v.hash_key(state));
            }
            Value::Record(fields) => {
                fields.len().hash(state);
                return fields.iter().all(|(name, v)| {
                    name.hash(state);
                    v.hash_key(state)
                });
            }
            Value::Null => {}
        }
        true
    }

    /// JSON rendering for inspection and logging.
    ///
    /// Maps keyed by strings become objects; any other map becomes an array
    /// of `[key, value]` pairs. Non-finite doubles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int32(i) => serde_json::json!(i),
            Value::Int64(i) => serde_json::json!(i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => {
                if entries.iter().all(|(k, _)| matches!(k, Value::String(_))) {
                    let map: serde_json::Map<String, serde_json::Value> = entries
                        .iter()
                        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.to_json())))
                        .collect();
                    serde_json::Value::Object(map)
                } else {
                    serde_json::Value::Array(
                        entries
                            .iter()
                            .map(|(k, v)| serde_json::Value::Array(vec![k.to_json(), v.to_json()]))
                            .collect(),
                    )
                }
            }
            Value::Record(fields) => {
                let map: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                serde_json::Value::Object(map)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_view_of_record() {
        let v = Value::Record(vec![
            ("id".to_string(), Value::Int64(7)),
            ("tags".to_string(), Value::List(vec!["a".into(), "b".into()])),
            (
                "prices".to_string(),
                Value::Map(vec![("bid".into(), Value::Double(1.5))]),
            ),
        ]);
        assert_eq!(
            v.to_json(),
            serde_json::json!({"id": 7, "tags": ["a", "b"], "prices": {"bid": 1.5}})
        );
    }

    #[test]
    fn json_view_of_int_keyed_map() {
        let v = Value::Map(vec![(Value::Int32(1), Value::Bool(true))]);
        assert_eq!(v.to_json(), serde_json::json!([[1, true]]));
        assert_eq!(Value::Double(f64::NAN).to_json(), serde_json::Value::Null);
    }

    fn hash_of(v: &Value) -> Option<u64> {
        let mut state = std::collections::hash_map::DefaultHasher::new();
        v.hash_key(&mut state).then(|| state.finish())
    }

    #[test]
    fn key_hash_agrees_with_equality() {
        assert_eq!(hash_of(&Value::Double(0.0)), hash_of(&Value::Double(-0.0)));
        assert_eq!(hash_of(&Value::from("k")), hash_of(&Value::String("k".to_string())));
        assert_ne!(hash_of(&Value::Int32(1)), hash_of(&Value::Int64(1)));

        let rec = |v: f64| Value::Record(vec![("x".to_string(), Value::Double(v))]);
        assert_eq!(hash_of(&rec(2.5)), hash_of(&rec(2.5)));
        assert_eq!(hash_of(&Value::Double(f64::NAN)), None);
        assert_eq!(hash_of(&Value::List(vec![Value::Double(f64::NAN)])), None);
    }

    #[test]
    fn lookups() {
        let map = Value::Map(vec![(Value::Int32(1), "one".into())]);
        assert_eq!(map.get(&Value::Int32(1)), Some(&Value::from("one")));
        assert_eq!(map.get(&Value::Int32(2)), None);

        let rec = Value::Record(vec![("a".to_string(), Value::Int32(1))]);
        assert_eq!(rec.field("a"), Some(&Value::Int32(1)));
        assert_eq!(rec.field("b"), None);
        assert_eq!(Value::Null.type_name(), "null");
    }
}
