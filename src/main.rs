use bedrock_rpc_proxy::{auth::RelayAuthBackend, gateway};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Proxies a Bedrock client to a rental server.
#[derive(Debug, Parser)]
struct Args {
    /// Address game clients connect to.
    #[arg(long, default_value = "127.0.0.1:19132")]
    listen: SocketAddr,
    /// Address of the rental server.
    #[arg(long)]
    rental_server: SocketAddr,
    /// Address of the auth relay.
    #[arg(long)]
    auth_relay: SocketAddr,
    /// Log filter, in `RUST_LOG` syntax.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .init();

    let auth = Arc::new(RelayAuthBackend::connect(args.auth_relay).await?);
    let listener = TcpListener::bind(args.listen).await?;

    tracing::info!("Started on {}", listener.local_addr()?);

    gateway::run(listener, args.rental_server, auth).await?;

    Ok(())
}
