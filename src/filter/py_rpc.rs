use super::Decision;
use crate::{
    auth::AuthBackend,
    protocol::{
        packet::{PyRpc, PyRpcOperationType},
        py_rpc::{self, GetMcpCheckNum, RpcMessage, SetMcpCheckNum, StartType, StartTypeKind},
        Frame,
    },
    proxy::PacketSink,
    session::Session,
};
use anyhow::Context;

/// Handles a PyRpc packet from the rental server.
///
/// Unknown calls and undecodable payloads are forwarded untouched.
pub(super) async fn on_py_rpc<A, U>(
    session: &mut Session<A>,
    packet: &PyRpc,
    upstream: &U,
) -> Decision
where
    A: AuthBackend,
    U: PacketSink,
{
    if packet.value.is_empty() {
        return Decision::forward();
    }
    let message = match py_rpc::unmarshal(&packet.value) {
        Ok(message) => message,
        Err(e) => {
            return Decision::forward()
                .with_error(anyhow::Error::from(e).context("decode PyRpc payload"))
        }
    };
    tracing::trace!("PyRpc {}", message.name());

    match message {
        RpcMessage::StartType(start) => {
            let result = answer_start_type(session, start, upstream).await;
            Decision::suppress().with_result(result)
        }
        RpcMessage::GetMcpCheckNum(check) => {
            if session.check_num_passed() {
                tracing::debug!("Integrity challenge already passed, dropping repeat");
                return Decision::suppress();
            }
            let result = answer_check_num(session, &check, upstream).await;
            Decision::suppress().with_result(result)
        }
        _ => Decision::forward(),
    }
}

async fn answer_start_type<A, U>(
    session: &Session<A>,
    mut start: StartType,
    upstream: &U,
) -> anyhow::Result<()>
where
    A: AuthBackend,
    U: PacketSink,
{
    start.content = session
        .auth()
        .transfer_data(&start.content)
        .await
        .context("auth backend TransferData")?;
    start.kind = StartTypeKind::Response;

    send_rpc(upstream, &RpcMessage::StartType(start))
        .await
        .context("send SetStartType")
}

/// Relays the integrity challenge to the auth backend and sends its
/// answer back. The session is only marked as passed once the answer
/// has been sent.
async fn answer_check_num<A, U>(
    session: &mut Session<A>,
    check: &GetMcpCheckNum,
    upstream: &U,
) -> anyhow::Result<()>
where
    A: AuthBackend,
    U: PacketSink,
{
    let entity_unique_id = match session.entity_unique_id() {
        Some(id) => id.as_i64(),
        None => {
            tracing::warn!("Integrity challenge arrived before StartGame");
            0
        }
    };
    let args = serde_json::to_string(&serde_json::json!([
        check.first_arg,
        check.second_arg.arg,
        entity_unique_id,
    ]))?;

    let reply = session
        .auth()
        .transfer_check_num(&args)
        .await
        .context("auth backend TransferCheckNum")?;
    let answer = SetMcpCheckNum::from_backend_reply(&reply)
        .context("auth backend returned a malformed check num")?;

    send_rpc(upstream, &RpcMessage::SetMcpCheckNum(answer))
        .await
        .context("send SetMCPCheckNum")?;

    session.mark_check_num_passed();
    tracing::info!("Integrity challenge passed");
    Ok(())
}

async fn send_rpc<U: PacketSink>(upstream: &U, message: &RpcMessage) -> anyhow::Result<()> {
    upstream
        .send_packet(
            Frame::typed(PyRpc {
                value: py_rpc::marshal(message),
                operation_type: PyRpcOperationType::Send,
            }),
            false,
        )
        .await
}
