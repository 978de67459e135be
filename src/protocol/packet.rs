//! Typed Bedrock packets the proxy inspects.
//!
//! Decoding packets from the wire is the transport's job. Only the
//! packets the filter cares about are modelled; everything else
//! travels as a [`RawPacket`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::AsRefStr)]
pub enum Packet {
    PyRpc(PyRpc),
    StartGame(StartGame),
    UpdatePlayerGameType(UpdatePlayerGameType),
    SetPlayerGameType(SetPlayerGameType),
    NeteaseJson(NeteaseJson),
    Other(RawPacket),
}

macro_rules! from_variants {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Packet {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

from_variants!(
    PyRpc,
    StartGame,
    UpdatePlayerGameType,
    SetPlayerGameType,
    NeteaseJson,
);

impl From<RawPacket> for Packet {
    fn from(value: RawPacket) -> Self {
        Self::Other(value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PyRpcOperationType {
    Send,
    Receive,
}

/// Carries a serialized remote call, see [`crate::protocol::py_rpc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyRpc {
    pub value: Vec<u8>,
    pub operation_type: PyRpcOperationType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGame {
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub player_game_type: i32,
    pub world_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlayerGameType {
    pub game_type: i32,
    pub player_unique_id: i64,
    pub tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPlayerGameType {
    pub game_type: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeteaseJson {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPacket {
    pub id: u32,
    pub payload: Vec<u8>,
}

/// A packet as handed over by the transport: the typed packet, if the
/// transport could decode it, and the bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub packet: Option<Packet>,
    pub raw: Vec<u8>,
}

impl Frame {
    pub fn typed(packet: impl Into<Packet>) -> Self {
        Self {
            packet: Some(packet.into()),
            raw: Vec::new(),
        }
    }

    pub fn raw(raw: Vec<u8>) -> Self {
        Self { packet: None, raw }
    }

    /// Whether sending this frame has to fall back to its raw bytes.
    pub fn needs_raw_bytes(&self) -> bool {
        self.packet.is_none()
    }

    pub fn name(&self) -> &str {
        self.packet.as_ref().map_or("<raw>", |packet| packet.as_ref())
    }
}
