/// A dynamically typed MessagePack value, as carried
/// inside a PyRpc payload.
///
/// Maps keep their entries in wire order and may use
/// any value as a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    /// Only used for integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Ext(i8, Vec<u8>),
}

impl Value {
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Converts a parsed JSON document into a value.
    ///
    /// Every JSON number becomes a `Float`, whether or not it was
    /// written with a fraction.
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Float(n.as_f64().unwrap_or_default()),
            Json::String(s) => Value::Str(s),
            Json::Array(values) => Value::Array(values.into_iter().map(Value::from_json).collect()),
            Json::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_numbers_become_floats() {
        let json: serde_json::Value = serde_json::from_str("[1, -2, 7.5, 18446744073709551615]").unwrap();
        assert_eq!(
            Value::from_json(json),
            Value::Array(vec![
                Value::Float(1.0),
                Value::Float(-2.0),
                Value::Float(7.5),
                Value::Float(u64::MAX as f64),
            ])
        );
    }

    #[test]
    fn json_objects_become_string_keyed_maps() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a": null, "b": [true]}"#).unwrap();
        assert_eq!(
            Value::from_json(json),
            Value::Map(vec![
                (Value::from("a"), Value::Nil),
                (Value::from("b"), Value::Array(vec![Value::Bool(true)])),
            ])
        );
    }
}
