//! Transparent proxy between a Bedrock game client and a rental server.
//!
//! Every packet from the rental server passes through a filter that
//! decides whether the client gets to see it. A few packets are
//! answered by the proxy itself:
//! * `StartGame` records the local player's entity ID and announces
//!   the logged in account and its equipped cosmetic.
//! * `UpdatePlayerGameType` for the local player is replaced by a
//!   `SetPlayerGameType`.
//! * `PyRpc` calls carrying the start/acknowledge exchange or the
//!   integrity challenge are relayed to an external auth backend and
//!   answered. The challenge is answered at most once per session.
//!
//! Client packets are passed through unchanged.

pub mod auth;
pub mod entity_id;
pub mod filter;
pub mod gateway;
pub mod protocol;
pub mod proxy;
pub mod session;
