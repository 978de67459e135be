pub mod packet;
pub mod py_rpc;

pub use packet::{Frame, Packet};
