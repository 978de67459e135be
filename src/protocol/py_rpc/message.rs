//! The RPC calls the proxy understands.
//!
//! Every call is a MessagePack array `[name, args, nil]`.
//! Calls whose name is unknown, or whose arguments do not have the
//! expected shape, decode as [`RpcMessage::Unknown`] so they can be
//! forwarded untouched.

use super::{decoder::DecodeError, value::Value};

pub const START_TYPE_REQUEST: &str = "GetStartType";
pub const START_TYPE_RESPONSE: &str = "SetStartType";
pub const GET_MCP_CHECK_NUM: &str = "GetMCPCheckNum";
pub const SET_MCP_CHECK_NUM: &str = "SetMCPCheckNum";
pub const SYNC_USING_MOD: &str = "SyncUsingMod";

/// Index of the check num reply element that the server
/// expects as an integer.
pub const INTEGRAL_REPLY_INDEX: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    StartType(StartType),
    GetMcpCheckNum(GetMcpCheckNum),
    SetMcpCheckNum(SetMcpCheckNum),
    SyncUsingMod(SyncUsingMod),
    Unknown { name: String, args: Value },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StartTypeKind {
    Request,
    Response,
}

/// Start/acknowledge exchange. The content is opaque to the proxy
/// and is substituted by the auth backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StartType {
    pub kind: StartTypeKind,
    pub content: String,
}

/// Integrity challenge issued by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMcpCheckNum {
    pub first_arg: String,
    pub second_arg: SecondArg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecondArg {
    pub arg: String,
}

/// Answer to [`GetMcpCheckNum`], as computed by the auth backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SetMcpCheckNum {
    pub values: Vec<Value>,
}

/// Announces the cosmetic currently equipped by the player.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUsingMod {
    pub skin_uuid: String,
    pub skin_item_id: String,
}

impl SetMcpCheckNum {
    /// Builds the answer from the auth backend's JSON reply,
    /// which must be an array.
    pub fn from_backend_reply(reply: &str) -> serde_json::Result<Self> {
        let values: Vec<serde_json::Value> = serde_json::from_str(reply)?;
        let mut values: Vec<Value> = values.into_iter().map(Value::from_json).collect();
        coerce_integral_reply(&mut values);
        Ok(Self { values })
    }
}

/// The backend reports every number as a float, but the server
/// only accepts an integer at [`INTEGRAL_REPLY_INDEX`].
/// Only floats that convert without loss are touched.
pub fn coerce_integral_reply(values: &mut [Value]) {
    let Some(slot) = values.get_mut(INTEGRAL_REPLY_INDEX) else {
        return;
    };
    if let Value::Float(x) = *slot {
        if x.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&x) {
            *slot = Value::Int(x as i64);
        }
    }
}

impl RpcMessage {
    pub fn name(&self) -> &str {
        match self {
            RpcMessage::StartType(StartType {
                kind: StartTypeKind::Request,
                ..
            }) => START_TYPE_REQUEST,
            RpcMessage::StartType(StartType {
                kind: StartTypeKind::Response,
                ..
            }) => START_TYPE_RESPONSE,
            RpcMessage::GetMcpCheckNum(_) => GET_MCP_CHECK_NUM,
            RpcMessage::SetMcpCheckNum(_) => SET_MCP_CHECK_NUM,
            RpcMessage::SyncUsingMod(_) => SYNC_USING_MOD,
            RpcMessage::Unknown { name, .. } => name,
        }
    }

    /// Interprets a decoded payload.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let Value::Array(mut call) = value else {
            return Err(DecodeError::NotACall);
        };
        if !matches!(call.first(), Some(Value::Str(_))) {
            return Err(DecodeError::NotACall);
        }
        let trailer_ok = call.len() <= 3 && call.get(2).map_or(true, Value::is_nil);
        call.truncate(2);
        let args = if call.len() == 2 {
            call.pop().unwrap_or(Value::Nil)
        } else {
            Value::Nil
        };
        let name = match call.pop() {
            Some(Value::Str(name)) => name,
            _ => return Err(DecodeError::NotACall),
        };

        let known = if trailer_ok {
            parse_args(&name, &args)
        } else {
            None
        };
        Ok(known.unwrap_or(RpcMessage::Unknown { name, args }))
    }

    pub fn to_value(&self) -> Value {
        let args = match self {
            RpcMessage::StartType(start) => Value::Array(vec![Value::from(start.content.as_str())]),
            RpcMessage::GetMcpCheckNum(check) => Value::Array(vec![
                Value::from(check.first_arg.as_str()),
                Value::Array(vec![Value::from(check.second_arg.arg.as_str())]),
            ]),
            RpcMessage::SetMcpCheckNum(answer) => {
                Value::Array(vec![Value::Array(answer.values.clone())])
            }
            RpcMessage::SyncUsingMod(sync) => Value::Array(vec![
                Value::Array(Vec::new()),
                Value::from(sync.skin_uuid.as_str()),
                Value::from(sync.skin_item_id.as_str()),
                Value::Bool(true),
                Value::Map(Vec::new()),
            ]),
            RpcMessage::Unknown { args, .. } => args.clone(),
        };
        Value::Array(vec![Value::from(self.name()), args, Value::Nil])
    }
}

fn parse_args(name: &str, args: &Value) -> Option<RpcMessage> {
    let args = args.as_array()?;
    let message = match (name, args) {
        (START_TYPE_REQUEST | START_TYPE_RESPONSE, [Value::Str(content)]) => {
            RpcMessage::StartType(StartType {
                kind: if name == START_TYPE_REQUEST {
                    StartTypeKind::Request
                } else {
                    StartTypeKind::Response
                },
                content: content.clone(),
            })
        }
        (GET_MCP_CHECK_NUM, [Value::Str(first_arg), Value::Array(second)]) => {
            let [Value::Str(arg)] = second.as_slice() else {
                return None;
            };
            RpcMessage::GetMcpCheckNum(GetMcpCheckNum {
                first_arg: first_arg.clone(),
                second_arg: SecondArg { arg: arg.clone() },
            })
        }
        (SET_MCP_CHECK_NUM, [Value::Array(values)]) => {
            RpcMessage::SetMcpCheckNum(SetMcpCheckNum {
                values: values.clone(),
            })
        }
        (
            SYNC_USING_MOD,
            [Value::Array(mods), Value::Str(skin_uuid), Value::Str(skin_item_id), Value::Bool(true), Value::Map(extra)],
        ) if mods.is_empty() && extra.is_empty() => RpcMessage::SyncUsingMod(SyncUsingMod {
            skin_uuid: skin_uuid.clone(),
            skin_item_id: skin_item_id.clone(),
        }),
        _ => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Value) -> Value {
        Value::Array(vec![Value::from(name), args, Value::Nil])
    }

    #[test]
    fn recognizes_challenge() {
        let value = call(
            GET_MCP_CHECK_NUM,
            Value::Array(vec![
                Value::from("first"),
                Value::Array(vec![Value::from("second")]),
            ]),
        );
        assert_eq!(
            RpcMessage::from_value(value).unwrap(),
            RpcMessage::GetMcpCheckNum(GetMcpCheckNum {
                first_arg: "first".into(),
                second_arg: SecondArg {
                    arg: "second".into()
                },
            })
        );
    }

    #[test]
    fn unexpected_argument_shape_is_unknown() {
        let args = Value::Array(vec![Value::Int(1)]);
        assert_eq!(
            RpcMessage::from_value(call(START_TYPE_REQUEST, args.clone())).unwrap(),
            RpcMessage::Unknown {
                name: START_TYPE_REQUEST.into(),
                args,
            }
        );
    }

    #[test]
    fn non_nil_trailer_is_unknown() {
        let value = Value::Array(vec![
            Value::from(START_TYPE_REQUEST),
            Value::Array(vec![Value::from("x")]),
            Value::Int(1),
        ]);
        assert!(matches!(
            RpcMessage::from_value(value).unwrap(),
            RpcMessage::Unknown { .. }
        ));
    }

    #[test]
    fn bare_name_is_unknown() {
        assert_eq!(
            RpcMessage::from_value(Value::Array(vec![Value::from("Ping")])).unwrap(),
            RpcMessage::Unknown {
                name: "Ping".into(),
                args: Value::Nil,
            }
        );
    }

    #[test]
    fn wrong_leading_tags_are_errors() {
        assert!(RpcMessage::from_value(Value::Int(1)).is_err());
        assert!(RpcMessage::from_value(Value::Array(vec![])).is_err());
        assert!(RpcMessage::from_value(Value::Array(vec![Value::Int(1), Value::Nil])).is_err());
    }

    #[test]
    fn coerces_index_six_float() {
        let answer = SetMcpCheckNum::from_backend_reply(r#"["a","b","c","d","e","f",7.0,"h"]"#)
            .unwrap();
        assert_eq!(answer.values[6], Value::Int(7));
        assert_eq!(answer.values[7], Value::from("h"));
    }

    #[test]
    fn seven_element_reply_is_coerced() {
        let answer = SetMcpCheckNum::from_backend_reply(r#"[0,0,0,0,0,0,7.0]"#).unwrap();
        assert_eq!(answer.values.len(), 7);
        assert_eq!(answer.values[6], Value::Int(7));
        assert_eq!(answer.values[5], Value::Float(0.0));
    }

    #[test]
    fn coercion_only_applies_to_whole_floats() {
        let mut values = vec![Value::Nil; 6];
        values.push(Value::Float(7.5));
        coerce_integral_reply(&mut values);
        assert_eq!(values[6], Value::Float(7.5));

        let mut values = vec![Value::Nil; 6];
        values.push(Value::from("7"));
        coerce_integral_reply(&mut values);
        assert_eq!(values[6], Value::from("7"));
    }

    #[test]
    fn short_reply_is_left_alone() {
        let answer = SetMcpCheckNum::from_backend_reply("[1.0, 2.5, 3.0]").unwrap();
        assert_eq!(
            answer.values,
            vec![Value::Float(1.0), Value::Float(2.5), Value::Float(3.0)]
        );
    }

    #[test]
    fn non_array_reply_is_an_error() {
        assert!(SetMcpCheckNum::from_backend_reply(r#"{"a": 1}"#).is_err());
        assert!(SetMcpCheckNum::from_backend_reply("").is_err());
    }
}
