//! Implements proxy logic.

use crate::{auth::AuthBackend, filter, protocol::Frame, session::Session};
use anyhow::{anyhow, Context};
use bincode::Options;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    select,
    sync::oneshot,
};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Something packets can be sent to.
pub trait PacketSink {
    /// Sends a frame. With `use_raw_bytes`, the frame's raw bytes are
    /// sent instead of re-encoding its typed packet.
    async fn send_packet(&self, frame: Frame, use_raw_bytes: bool) -> anyhow::Result<()>;
}

/// One side of a proxied connection.
pub trait PacketIo: PacketSink {
    async fn recv_packet(&self) -> anyhow::Result<Frame>;
}

type SendFrame = (Frame, bool, oneshot::Sender<anyhow::Result<()>>);

/// `PacketIo` backed by channels. The other ends are driven either
/// by background tasks owning a socket ([`ChannelPacketIo::framed`])
/// or by a [`ChannelRemote`].
pub struct ChannelPacketIo {
    sender: flume::Sender<SendFrame>,
    receiver: flume::Receiver<anyhow::Result<Frame>>,
}

impl ChannelPacketIo {
    /// Creates a connection whose far end is the returned `ChannelRemote`.
    pub fn pair() -> (Self, ChannelRemote) {
        let (sender, outgoing) = flume::unbounded();
        let (incoming, receiver) = flume::unbounded();
        (
            Self { sender, receiver },
            ChannelRemote { outgoing, incoming },
        )
    }

    /// Carries frames over a TCP stream, length-delimited and
    /// serialized with `bincode`.
    pub fn framed(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (sender, outgoing) = flume::unbounded();
        let (incoming, receiver) = flume::unbounded();
        tokio::spawn(write_frames(
            FramedWrite::new(write_half, LengthDelimitedCodec::new()),
            outgoing,
        ));
        tokio::spawn(read_frames(
            FramedRead::new(read_half, LengthDelimitedCodec::new()),
            incoming,
        ));
        Self { sender, receiver }
    }
}

impl PacketSink for ChannelPacketIo {
    async fn send_packet(&self, frame: Frame, use_raw_bytes: bool) -> anyhow::Result<()> {
        let (completion_tx, completion_rx) = oneshot::channel();
        self.sender
            .send_async((frame, use_raw_bytes, completion_tx))
            .await
            .ok()
            .context("disconnected")?;
        completion_rx.await.context("stream died")?
    }
}

impl PacketIo for ChannelPacketIo {
    async fn recv_packet(&self) -> anyhow::Result<Frame> {
        self.receiver.recv_async().await.context("disconnected")?
    }
}

/// The far end of a [`ChannelPacketIo::pair`].
///
/// Dropping it closes the connection.
pub struct ChannelRemote {
    outgoing: flume::Receiver<SendFrame>,
    incoming: flume::Sender<anyhow::Result<Frame>>,
}

impl ChannelRemote {
    /// Waits for the next frame sent through the connection and
    /// reports it as delivered.
    pub async fn next_sent(&self) -> Option<(Frame, bool)> {
        let (frame, use_raw_bytes, completion) = self.outgoing.recv_async().await.ok()?;
        completion.send(Ok(())).ok();
        Some((frame, use_raw_bytes))
    }

    /// Like `next_sent`, without waiting.
    pub fn try_next_sent(&self) -> Option<(Frame, bool)> {
        let (frame, use_raw_bytes, completion) = self.outgoing.try_recv().ok()?;
        completion.send(Ok(())).ok();
        Some((frame, use_raw_bytes))
    }

    /// Makes `frame` the next frame received by the connection.
    pub async fn deliver(&self, frame: Frame) -> anyhow::Result<()> {
        self.incoming
            .send_async(Ok(frame))
            .await
            .ok()
            .context("connection dropped")
    }
}

async fn write_frames(
    mut sink: FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
    outgoing: flume::Receiver<SendFrame>,
) {
    while let Ok((frame, use_raw_bytes, completion)) = outgoing.recv_async().await {
        let result = write_frame(&mut sink, frame, use_raw_bytes).await;
        let failed = result.is_err();
        completion.send(result).ok();
        if failed {
            break;
        }
    }
}

async fn write_frame(
    sink: &mut FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>,
    frame: Frame,
    use_raw_bytes: bool,
) -> anyhow::Result<()> {
    let frame = if use_raw_bytes {
        Frame::raw(frame.raw)
    } else {
        Frame {
            packet: Some(frame.packet.context("frame has no packet to encode")?),
            raw: Vec::new(),
        }
    };
    let bytes = bincode::options().serialize(&frame)?;
    sink.send(Bytes::from(bytes)).await?;
    Ok(())
}

async fn read_frames(
    mut stream: FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    incoming: flume::Sender<anyhow::Result<Frame>>,
) {
    loop {
        let result = match stream.next().await {
            Some(Ok(bytes)) => bincode::options()
                .deserialize::<Frame>(&bytes)
                .map_err(anyhow::Error::from),
            Some(Err(e)) => Err(e.into()),
            None => Err(anyhow!("end of stream")),
        };
        let failed = result.is_err();
        if incoming.send_async(result).await.is_err() || failed {
            break;
        }
    }
}

/// Bridges a game client and the rental server for one session.
///
/// Client packets are passed through verbatim. Server packets go
/// through [`filter::filter_packet`] and reach the client only if the
/// filter says so.
pub struct Proxy<A, C, S> {
    session: Session<A>,
    client: C,
    server: S,
}

impl<A, C, S> Proxy<A, C, S>
where
    A: AuthBackend,
    C: PacketIo,
    S: PacketIo,
{
    pub fn new(session: Session<A>, client: C, server: S) -> Self {
        Self {
            session,
            client,
            server,
        }
    }

    /// Runs until either side disconnects.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            mut session,
            client,
            server,
        } = self;

        loop {
            select! {
                frame = client.recv_packet() => {
                    let frame = frame.context("client connection")?;
                    let use_raw_bytes = frame.needs_raw_bytes();
                    server
                        .send_packet(frame, use_raw_bytes)
                        .await
                        .context("send to rental server")?;
                }
                frame = server.recv_packet() => {
                    let frame = frame.context("rental server connection")?;
                    let decision =
                        filter::filter_packet(&mut session, frame.packet.as_ref(), &server, &client)
                            .await;
                    if let Some(e) = &decision.error {
                        tracing::warn!("Filtering {}: {e:?}", frame.name());
                    }
                    if decision.forward_original {
                        let use_raw_bytes = frame.needs_raw_bytes();
                        client
                            .send_packet(frame, use_raw_bytes)
                            .await
                            .context("send to client")?;
                    } else {
                        tracing::trace!("Suppressed {}", frame.name());
                    }
                }
            }
        }
    }
}
