//! The polymorphic Redis reply domain: a sum type mirroring RESP's
//! dynamic shape, plus the `type` tag serialized alongside it in every
//! `CommandResponse`.

use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// One Redis reply, already detached from the wire format.
///
/// `Map` is kept ordered (`Vec` of pairs) because RESP2 hashes and RESP3 maps both
/// arrive as an interleaved flat list; callers that want `HashMap` semantics can
/// collect it themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum RedisValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<RedisValue>),
    Map(Vec<(String, RedisValue)>),
}

/// The response's `type` tag. Inferred from the dynamic type of the parsed
/// reply; clients must not rely on exhaustive accuracy beyond this enumerated
/// set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    String,
    Integer,
    Float,
    Array,
    Nil,
    Bool,
    Hash,
}

impl RedisValue {
    pub fn type_tag(&self) -> ResponseType {
        match self {
            RedisValue::Nil => ResponseType::Nil,
            RedisValue::Bool(_) => ResponseType::Bool,
            RedisValue::Int(_) => ResponseType::Integer,
            RedisValue::Float(_) => ResponseType::Float,
            RedisValue::Str(_) => ResponseType::String,
            RedisValue::Array(_) => ResponseType::Array,
            RedisValue::Map(_) => ResponseType::Hash,
        }
    }

    /// Converts a raw `redis::Value` reply into our JSON-friendly domain. `Err`
    /// replies never reach here — `redis`'s API surfaces those as `RedisError`,
    /// which callers turn into the `error` field instead.
    pub fn from_redis(value: redis::Value) -> Self {
        match value {
            redis::Value::Nil => RedisValue::Nil,
            redis::Value::Int(i) => RedisValue::Int(i),
            redis::Value::BulkString(bytes) => {
                RedisValue::Str(String::from_utf8_lossy(&bytes).into_owned())
            }
            redis::Value::SimpleString(s) => RedisValue::Str(s),
            redis::Value::Okay => RedisValue::Str("OK".to_string()),
            redis::Value::Boolean(b) => RedisValue::Bool(b),
            redis::Value::Double(d) => RedisValue::Float(d),
            redis::Value::Array(items) | redis::Value::Set(items) => {
                RedisValue::Array(items.into_iter().map(RedisValue::from_redis).collect())
            }
            redis::Value::Map(pairs) => RedisValue::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (redis_key_to_string(k), RedisValue::from_redis(v)))
                    .collect(),
            ),
            other => RedisValue::Str(format!("{other:?}")),
        }
    }
}

/// Per-command error detection inside a pipeline/transaction reply array: a `Value::ServerError` marks one command's error reply without
/// aborting the rest of the batch.
pub fn extract_error(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::ServerError(e) => Some(format!("{e:?}")),
        _ => None,
    }
}

fn redis_key_to_string(key: redis::Value) -> String {
    match RedisValue::from_redis(key) {
        RedisValue::Str(s) => s,
        other => format!("{other:?}"),
    }
}

impl Serialize for RedisValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            RedisValue::Nil => serializer.serialize_none(),
            RedisValue::Bool(b) => serializer.serialize_bool(*b),
            RedisValue::Int(i) => serializer.serialize_i64(*i),
            RedisValue::Float(f) => serializer.serialize_f64(*f),
            RedisValue::Str(s) => serializer.serialize_str(s),
            RedisValue::Array(items) => items.serialize(serializer),
            RedisValue::Map(pairs) => {
                let map: HashMap<&str, &RedisValue> =
                    pairs.iter().map(|(k, v)| (k.as_str(), v)).collect();
                map.serialize(serializer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_tags_as_nil() {
        assert_eq!(RedisValue::Nil.type_tag(), ResponseType::Nil);
    }

    #[test]
    fn bulk_string_becomes_str() {
        let v = RedisValue::from_redis(redis::Value::BulkString(b"hello".to_vec()));
        assert_eq!(v, RedisValue::Str("hello".to_string()));
        assert_eq!(v.type_tag(), ResponseType::String);
    }

    #[test]
    fn array_of_bulk_strings() {
        let v = RedisValue::from_redis(redis::Value::Array(vec![
            redis::Value::BulkString(b"1".to_vec()),
            redis::Value::BulkString(b"2".to_vec()),
        ]));
        assert_eq!(
            v,
            RedisValue::Array(vec![
                RedisValue::Str("1".to_string()),
                RedisValue::Str("2".to_string())
            ])
        );
        assert_eq!(v.type_tag(), ResponseType::Array);
    }

    #[test]
    fn json_encodes_nil_as_null() {
        let json = serde_json::to_string(&RedisValue::Nil).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn json_encodes_map_as_object() {
        let v = RedisValue::Map(vec![("a".to_string(), RedisValue::Int(1))]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"a":1}"#);
    }
}
