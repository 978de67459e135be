//! Codec for the payload carried by the PyRpc packet.
//!
//! The payload is a MessagePack document describing a single
//! remote call. [`unmarshal`] turns it into an [`RpcMessage`], and
//! [`marshal`] is its exact inverse for every message the proxy emits.

mod decoder;
mod encoder;
mod message;
mod value;

pub use decoder::{decode_value, DecodeError, Decoder};
pub use encoder::{encode_value, Encoder};
pub use message::{
    coerce_integral_reply, GetMcpCheckNum, RpcMessage, SecondArg, SetMcpCheckNum, StartType,
    StartTypeKind, SyncUsingMod, INTEGRAL_REPLY_INDEX,
};
pub use value::Value;

/// Decodes a PyRpc payload.
///
/// Fails only if the payload is not well-formed MessagePack, or is
/// not an array led by a method name.
pub fn unmarshal(bytes: &[u8]) -> Result<RpcMessage, DecodeError> {
    RpcMessage::from_value(decode_value(bytes)?)
}

/// Encodes an RPC message into a PyRpc payload.
pub fn marshal(message: &RpcMessage) -> Vec<u8> {
    encode_value(&message.to_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_type_round_trips() {
        let message = RpcMessage::StartType(StartType {
            kind: StartTypeKind::Response,
            content: "opaque-content".into(),
        });
        assert_eq!(unmarshal(&marshal(&message)).unwrap(), message);
    }

    #[test]
    fn challenge_round_trips() {
        let message = RpcMessage::GetMcpCheckNum(GetMcpCheckNum {
            first_arg: "a1b2".into(),
            second_arg: SecondArg { arg: "c3d4".into() },
        });
        assert_eq!(unmarshal(&marshal(&message)).unwrap(), message);
    }

    #[test]
    fn challenge_response_round_trips() {
        let message = RpcMessage::SetMcpCheckNum(SetMcpCheckNum {
            values: vec![
                Value::from("x"),
                Value::Float(1.5),
                Value::Int(-4),
                Value::Bool(false),
                Value::Nil,
                Value::Array(vec![Value::Int(1)]),
                Value::Int(7),
            ],
        });
        assert_eq!(unmarshal(&marshal(&message)).unwrap(), message);
    }

    #[test]
    fn sync_using_mod_round_trips() {
        let message = RpcMessage::SyncUsingMod(SyncUsingMod {
            skin_uuid: "00000000-0000-0000-0000-000000000001".into(),
            skin_item_id: "4668241170787418389".into(),
        });
        assert_eq!(unmarshal(&marshal(&message)).unwrap(), message);
    }

    #[test]
    fn start_type_wire_layout() {
        let message = RpcMessage::StartType(StartType {
            kind: StartTypeKind::Request,
            content: "c".into(),
        });
        let mut expected = vec![0x93, 0xac];
        expected.extend_from_slice(b"GetStartType");
        expected.extend_from_slice(&[0x91, 0xa1, b'c', 0xc0]);
        assert_eq!(marshal(&message), expected);
    }

    #[test]
    fn unrecognized_call_decodes() {
        let payload = encode_value(&Value::Array(vec![
            Value::from("ModEventS2C"),
            Value::Array(vec![Value::from("Minecraft"), Value::from("preset")]),
            Value::Nil,
        ]));
        assert!(matches!(
            unmarshal(&payload).unwrap(),
            RpcMessage::Unknown { name, .. } if name == "ModEventS2C"
        ));
    }

    #[test]
    fn malformed_payload_fails() {
        assert!(unmarshal(&[0x93, 0xac, b'G']).is_err());
        assert!(unmarshal(&[0xc0]).is_err());
    }
}
