#![allow(dead_code)]

use bedrock_rpc_proxy::{
    auth::AuthBackend,
    protocol::{
        packet::{Packet, PyRpc, PyRpcOperationType},
        py_rpc::{self, RpcMessage},
        Frame,
    },
    proxy::PacketSink,
};
use std::cell::{Cell, RefCell};

/// Auth backend that records how often it is called.
pub struct MockAuth {
    pub uid: String,
    pub check_num_reply: String,
    pub fail: bool,
    pub transfer_data_calls: Cell<usize>,
    pub check_num_calls: RefCell<Vec<String>>,
}

impl MockAuth {
    pub fn new(check_num_reply: &str) -> Self {
        Self {
            uid: "2147483647".into(),
            check_num_reply: check_num_reply.into(),
            fail: false,
            transfer_data_calls: Cell::new(0),
            check_num_calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("[]")
        }
    }

    pub fn check_num_call_count(&self) -> usize {
        self.check_num_calls.borrow().len()
    }
}

impl AuthBackend for MockAuth {
    fn uid(&self) -> &str {
        &self.uid
    }

    async fn transfer_data(&self, content: &str) -> anyhow::Result<String> {
        self.transfer_data_calls.set(self.transfer_data_calls.get() + 1);
        if self.fail {
            anyhow::bail!("backend unavailable");
        }
        Ok(format!("signed:{content}"))
    }

    async fn transfer_check_num(&self, args_json: &str) -> anyhow::Result<String> {
        self.check_num_calls.borrow_mut().push(args_json.to_owned());
        if self.fail {
            anyhow::bail!("backend unavailable");
        }
        Ok(self.check_num_reply.clone())
    }
}

/// Sink that keeps every frame sent through it.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: RefCell<Vec<(Frame, bool)>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.sent
            .borrow()
            .iter()
            .filter_map(|(frame, _)| frame.packet.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl PacketSink for RecordingSink {
    async fn send_packet(&self, frame: Frame, use_raw_bytes: bool) -> anyhow::Result<()> {
        self.sent.borrow_mut().push((frame, use_raw_bytes));
        if self.fail {
            anyhow::bail!("connection closed");
        }
        Ok(())
    }
}

pub fn py_rpc_packet(message: &RpcMessage) -> Packet {
    Packet::PyRpc(PyRpc {
        value: py_rpc::marshal(message),
        operation_type: PyRpcOperationType::Send,
    })
}

/// Decodes the RPC carried by a sent PyRpc packet.
pub fn sent_rpc(packet: &Packet) -> RpcMessage {
    match packet {
        Packet::PyRpc(py_rpc) => py_rpc::unmarshal(&py_rpc.value).unwrap(),
        other => panic!("expected PyRpc, got {}", AsRef::<str>::as_ref(other)),
    }
}
