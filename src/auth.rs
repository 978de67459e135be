//! Access to the external authentication backend.
//!
//! The proxy never authenticates anything itself: it relays the
//! server's challenges to the backend and forwards the answers.
//!
//! [`RelayAuthBackend`] reaches the backend through a relay speaking
//! `bincode` messages over a length-delimited TCP stream.

use anyhow::{anyhow, bail, Context};
use bincode::Options;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Operations the proxy needs from the authentication backend.
pub trait AuthBackend {
    /// Account ID of the authenticated user.
    fn uid(&self) -> &str;

    /// Substitutes the content of a start/acknowledge exchange.
    async fn transfer_data(&self, content: &str) -> anyhow::Result<String>;

    /// Relays an integrity challenge. Both arguments and
    /// result are JSON arrays.
    async fn transfer_check_num(&self, args_json: &str) -> anyhow::Result<String>;
}

/// A request sent to the auth relay.
#[derive(Debug, Serialize, Deserialize)]
enum RelayRequest {
    ClientInfo,
    TransferData { content: String },
    TransferCheckNum { args: String },
}

/// A response from the auth relay.
#[derive(Debug, Serialize, Deserialize)]
enum RelayResponse {
    ClientInfo { uid: String },
    TransferData { content: String },
    TransferCheckNum { response: String },
    Error { message: String },
}

/// Used to send and receive relay messages.
struct Codec {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl Codec {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    pub async fn send_message(&mut self, message: &impl Serialize) -> anyhow::Result<()> {
        let bytes = encode(message)?;
        self.framed.send(Bytes::from(bytes)).await?;
        Ok(())
    }

    pub async fn recv_message<M: DeserializeOwned>(&mut self) -> anyhow::Result<M> {
        let bytes = self
            .framed
            .next()
            .await
            .context("auth relay: end of stream")??;
        let message = decode(&bytes)?;
        Ok(message)
    }

    async fn call(&mut self, request: &RelayRequest) -> anyhow::Result<RelayResponse> {
        self.send_message(request).await?;
        match self.recv_message().await? {
            RelayResponse::Error { message } => Err(anyhow!("auth relay: {message}")),
            response => Ok(response),
        }
    }
}

/// [`AuthBackend`] talking to an auth relay.
///
/// Calls are serialized over one connection, so a single instance
/// can be shared by every session.
pub struct RelayAuthBackend {
    uid: String,
    codec: Mutex<Codec>,
}

impl RelayAuthBackend {
    /// Connects to the relay and fetches the account identity.
    pub async fn connect(address: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .with_context(|| format!("connect to auth relay at {address}"))?;
        let mut codec = Codec::new(stream);
        let RelayResponse::ClientInfo { uid } = codec.call(&RelayRequest::ClientInfo).await? else {
            bail!("auth relay answered ClientInfo with the wrong message");
        };
        tracing::info!("Authenticated as uid {uid}");
        Ok(Self {
            uid,
            codec: Mutex::new(codec),
        })
    }
}

impl AuthBackend for RelayAuthBackend {
    fn uid(&self) -> &str {
        &self.uid
    }

    async fn transfer_data(&self, content: &str) -> anyhow::Result<String> {
        let request = RelayRequest::TransferData {
            content: content.to_owned(),
        };
        match self.codec.lock().await.call(&request).await? {
            RelayResponse::TransferData { content } => Ok(content),
            other => Err(anyhow!("auth relay answered TransferData with {other:?}")),
        }
    }

    async fn transfer_check_num(&self, args_json: &str) -> anyhow::Result<String> {
        let request = RelayRequest::TransferCheckNum {
            args: args_json.to_owned(),
        };
        match self.codec.lock().await.call(&request).await? {
            RelayResponse::TransferCheckNum { response } => Ok(response),
            other => Err(anyhow!("auth relay answered TransferCheckNum with {other:?}")),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    bincode::options()
        .serialize(value)
        .map_err(anyhow::Error::from)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    bincode::options()
        .deserialize(bytes)
        .map_err(anyhow::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Answers relay requests the way a real relay would.
    async fn serve_one(listener: TcpListener) -> anyhow::Result<()> {
        let (stream, _) = listener.accept().await?;
        let mut codec = Codec::new(stream);
        loop {
            let request: RelayRequest = match codec.recv_message().await {
                Ok(request) => request,
                Err(_) => return Ok(()),
            };
            let response = match request {
                RelayRequest::ClientInfo => RelayResponse::ClientInfo {
                    uid: "123456".into(),
                },
                RelayRequest::TransferData { content } => RelayResponse::TransferData {
                    content: content.to_uppercase(),
                },
                RelayRequest::TransferCheckNum { .. } => RelayResponse::Error {
                    message: "challenge rejected".into(),
                },
            };
            codec.send_message(&response).await?;
        }
    }

    #[tokio::test]
    async fn relays_calls() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let server = tokio::spawn(serve_one(listener));

        let backend = RelayAuthBackend::connect(address).await?;
        assert_eq!(backend.uid(), "123456");
        assert_eq!(backend.transfer_data("abc").await?, "ABC");

        let err = backend.transfer_check_num("[]").await.unwrap_err();
        assert!(err.to_string().contains("challenge rejected"));

        drop(backend);
        server.await??;
        Ok(())
    }
}
