//! Decides, for every packet coming from the rental server, whether
//! it reaches the game client, and injects the packets the proxy
//! answers with.
//!
//! Two direct-send paths exist besides the normal forwarding:
//! `upstream` answers the rental server (login notices, RPC answers),
//! and `client` talks straight to the game client. Neither may
//! re-enter the filter.

mod py_rpc;

use crate::{
    auth::AuthBackend,
    entity_id::EntityUniqueId,
    protocol::{
        packet::{
            NeteaseJson, Packet, PyRpc, PyRpcOperationType, SetPlayerGameType, StartGame,
            UpdatePlayerGameType,
        },
        py_rpc::{marshal, RpcMessage, SyncUsingMod},
        Frame,
    },
    proxy::PacketSink,
    session::Session,
};
use anyhow::Context;

/// Outcome of filtering one packet.
///
/// The forwarding decision stands even when an error is reported:
/// errors are for logging, not for choosing a path.
#[derive(Debug)]
#[must_use]
pub struct Decision {
    /// Whether the original packet should still be copied to the client.
    pub forward_original: bool,
    pub error: Option<anyhow::Error>,
}

impl Decision {
    pub fn forward() -> Self {
        Self {
            forward_original: true,
            error: None,
        }
    }

    pub fn suppress() -> Self {
        Self {
            forward_original: false,
            error: None,
        }
    }

    pub fn with_error(mut self, error: anyhow::Error) -> Self {
        self.error = Some(error);
        self
    }

    fn with_result(self, result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => self,
            Err(e) => self.with_error(e),
        }
    }

    fn context(mut self, context: &'static str) -> Self {
        self.error = self.error.map(|e| e.context(context));
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Filters one packet received from the rental server.
///
/// `packet` is `None` when the transport could not decode it;
/// such packets are always forwarded.
pub async fn filter_packet<A, U, C>(
    session: &mut Session<A>,
    packet: Option<&Packet>,
    upstream: &U,
    client: &C,
) -> Decision
where
    A: AuthBackend,
    U: PacketSink,
    C: PacketSink,
{
    let Some(packet) = packet else {
        return Decision::forward();
    };

    match packet {
        Packet::PyRpc(py_rpc) => py_rpc::on_py_rpc(session, py_rpc, upstream)
            .await
            .context("packet filter"),
        Packet::StartGame(start_game) => {
            let result = on_start_game(session, start_game, upstream).await;
            Decision::forward()
                .with_result(result)
                .context("packet filter")
        }
        Packet::UpdatePlayerGameType(update) => on_update_player_game_type(session, update, client)
            .await
            .context("packet filter"),
        _ => Decision::forward(),
    }
}

async fn on_start_game<A, U>(
    session: &mut Session<A>,
    start_game: &StartGame,
    upstream: &U,
) -> anyhow::Result<()>
where
    A: AuthBackend,
    U: PacketSink,
{
    session.record_entity_unique_id(EntityUniqueId::new(start_game.entity_unique_id));
    tracing::debug!(
        "Game started, local entity unique ID {}",
        start_game.entity_unique_id
    );

    let login_uid = serde_json::json!({
        "eventName": "LOGIN_UID",
        "resid": "",
        "uid": session.auth().uid(),
    });
    upstream
        .send_packet(
            Frame::typed(NeteaseJson {
                data: serde_json::to_vec(&login_uid)?,
            }),
            false,
        )
        .await
        .context("send LOGIN_UID")?;

    let skin = session.player_skin();
    let sync = RpcMessage::SyncUsingMod(SyncUsingMod {
        skin_uuid: skin.skin_uuid.clone(),
        skin_item_id: skin.skin_item_id.clone(),
    });
    upstream
        .send_packet(
            Frame::typed(PyRpc {
                value: marshal(&sync),
                operation_type: PyRpcOperationType::Send,
            }),
            false,
        )
        .await
        .context("send SyncUsingMod")?;

    Ok(())
}

/// Game mode changes for the local player are delivered as
/// `SetPlayerGameType`, which the client applies reliably; the
/// original update is then dropped so the client never sees both.
async fn on_update_player_game_type<A, C>(
    session: &Session<A>,
    update: &UpdatePlayerGameType,
    client: &C,
) -> Decision
where
    A: AuthBackend,
    C: PacketSink,
{
    if !session.is_local_player(update.player_unique_id) {
        return Decision::forward();
    }

    let result = client
        .send_packet(
            Frame::typed(SetPlayerGameType {
                game_type: update.game_type,
            }),
            false,
        )
        .await
        .context("send SetPlayerGameType");
    Decision::suppress().with_result(result)
}
