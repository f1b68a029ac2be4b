//! Wire framing.
//!
//! Every frame is length-prefixed (4 bytes, big endian). The first frame in
//! each direction is the postcard-encoded [`NodeDescriptor`](seeder_node_api::NodeDescriptor);
//! every later frame is `[channel][payload]`.

use bytes::{BufMut, Bytes, BytesMut};
use seeder_node_api::ChannelId;
use thiserror::Error;
use tokio_util::codec::LengthDelimitedCodec;

/// Largest frame accepted from a peer.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
}

/// Length-delimited codec with the frame size limit applied.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Prefix `payload` with its channel byte.
pub fn encode_frame(channel: ChannelId, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 1);
    buf.put_u8(channel.0);
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Split a received frame into channel and payload.
pub fn decode_frame(frame: BytesMut) -> Result<(ChannelId, Bytes), FrameError> {
    let channel = *frame.first().ok_or(FrameError::Empty)?;
    Ok((ChannelId(channel), frame.freeze().slice(1..)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(ChannelId(0x30), b"hello");
        assert_eq!(&frame[..], b"\x30hello");

        let (channel, payload) = decode_frame(BytesMut::from(&frame[..])).unwrap();
        assert_eq!(channel, ChannelId(0x30));
        assert_eq!(&payload[..], b"hello");
    }

    #[test]
    fn test_empty_payload_and_frame() {
        let (channel, payload) = decode_frame(BytesMut::from(&[0x00u8][..])).unwrap();
        assert_eq!(channel, ChannelId(0));
        assert!(payload.is_empty());

        assert_eq!(decode_frame(BytesMut::new()), Err(FrameError::Empty));
    }
}
