//! Implements the gateway server. Accepts game clients and
//! bridges each of them to the rental server.

use crate::{
    auth::AuthBackend,
    proxy::{ChannelPacketIo, Proxy},
    session::Session,
};
use anyhow::Context;
use std::{net::SocketAddr, sync::Arc, thread};
use tokio::{
    net::{TcpListener, TcpStream},
    runtime,
    task::LocalSet,
};

/// Runs a gateway server on the given listener.
///
/// Every connection gets its own thread and [`Session`]; the session
/// ends when either peer disconnects.
pub async fn run<A>(
    listener: TcpListener,
    rental_server: SocketAddr,
    auth: Arc<A>,
) -> anyhow::Result<()>
where
    A: AuthBackend + Send + Sync + 'static,
{
    loop {
        let (stream, address) = listener.accept().await.context("listener closed")?;

        tracing::info!("Accepted connection from {address}");
        let auth = Arc::clone(&auth);
        let runtime = runtime::Handle::current();
        thread::spawn(move || {
            let local_set = LocalSet::new();
            local_set.spawn_local(async move {
                if let Err(e) = drive_connection(stream, rental_server, auth).await {
                    tracing::info!("Connection lost: {e:?}");
                }
            });
            runtime.block_on(local_set);
        });
    }
}

async fn drive_connection<A: AuthBackend>(
    stream: TcpStream,
    rental_server: SocketAddr,
    auth: Arc<A>,
) -> anyhow::Result<()> {
    let server_connection = TcpStream::connect(rental_server)
        .await
        .with_context(|| format!("connect to rental server {rental_server}"))?;
    tracing::info!("Connected to rental server {rental_server}");

    Proxy::new(
        Session::new(auth),
        ChannelPacketIo::framed(stream),
        ChannelPacketIo::framed(server_connection),
    )
    .run()
    .await
}
