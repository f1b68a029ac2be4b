//! A handshaken connection bound to one protocol channel.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use seeder_node_api::{ChannelId, PeerAddr, PeerInfo};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{
    frame::{self, FrameError},
    transport::Connection,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("frame on unregistered channel {0}")]
    UnknownChannel(ChannelId),
}

/// A live session handed to a [`ProtocolHandler`].
///
/// Dropping the session closes the underlying socket.
#[derive(Debug)]
pub struct Session {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    info: PeerInfo,
    channel: ChannelId,
}

impl Session {
    pub(crate) fn new(conn: Connection, channel: ChannelId) -> Self {
        let info = conn.peer_info();
        Self {
            framed: conn.into_framed(),
            info,
            channel,
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.info
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Send one message on the session's channel.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        self.framed
            .send(frame::encode_frame(self.channel, payload))
            .await?;
        Ok(())
    }

    /// Receive the next message. `Ok(None)` means the peer hung up.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, SessionError> {
        let Some(frame) = self.framed.next().await.transpose()? else {
            return Ok(None);
        };
        let (channel, payload) = frame::decode_frame(frame)?;
        if channel != self.channel {
            return Err(SessionError::UnknownChannel(channel));
        }
        Ok(Some(payload))
    }

    /// Flush pending frames and shut the socket down.
    pub async fn close(mut self) -> Result<(), SessionError> {
        SinkExt::<Bytes>::close(&mut self.framed).await?;
        Ok(())
    }
}

/// The protocol run on every session the switch establishes.
#[async_trait]
pub trait ProtocolHandler: Send + Sync + 'static {
    /// Channel this handler speaks.
    fn channel(&self) -> ChannelId;

    /// Up to `max` peers the switch should dial next.
    fn dial_candidates(&self, max: usize) -> Vec<PeerAddr>;

    /// Drive a session until the protocol is done with it.
    ///
    /// The session is closed when this returns.
    async fn handle_session(&self, session: Session);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TcpTransport, test_utils::descriptor};
    use assert_matches::assert_matches;
    use seeder_node_api::{Direction, PEX_CHANNEL, PeerAddr, Transport};
    use std::sync::Arc;

    async fn pair() -> (Session, Session) {
        let server = Arc::new(TcpTransport::new(descriptor(1, "net")));
        let addr = server.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let accept = {
            let server = server.clone();
            tokio::spawn(async move {
                let (stream, remote) = server.listener().unwrap().accept().await.unwrap();
                server.upgrade(stream, remote, Direction::Inbound, None).await.unwrap()
            })
        };

        let client = TcpTransport::new(descriptor(2, "net"));
        let outbound = client.dial(PeerAddr::new(addr)).await.unwrap();
        let inbound = accept.await.unwrap();
        (
            Session::new(outbound, PEX_CHANNEL),
            Session::new(inbound, PEX_CHANNEL),
        )
    }

    #[tokio::test]
    async fn test_send_then_close_reaches_peer() {
        let (mut outbound, mut inbound) = pair().await;
        assert_eq!(outbound.peer().direction, Direction::Outbound);
        assert_eq!(inbound.channel(), PEX_CHANNEL);

        outbound.send(b"hello").await.unwrap();
        outbound.close().await.unwrap();

        assert_eq!(inbound.recv().await.unwrap().as_deref(), Some(&b"hello"[..]));
        assert_matches!(inbound.recv().await, Ok(None));
    }

    #[tokio::test]
    async fn test_frame_on_other_channel_is_rejected() {
        let (outbound, mut inbound) = pair().await;
        let mut other = Session {
            channel: seeder_node_api::ChannelId(0x20),
            ..outbound
        };
        other.send(b"x").await.unwrap();
        assert_matches!(
            inbound.recv().await,
            Err(SessionError::UnknownChannel(seeder_node_api::ChannelId(0x20)))
        );
    }
}
