//! Length-prefixed framing over a byte stream.
//!
//! TCP is a byte stream, not a message transport, so each [`Message`] is
//! additionally prefixed with a big-endian `u32` byte count ahead of the
//! tag byte produced by [`Message::encode`] (§6). This module is pure
//! stream mechanics; it knows nothing about message semantics.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use chord_core::error::{Error, Result};

use crate::protocol::Message;

/// Frames larger than this are rejected outright rather than trusted to
/// allocate; no legitimate message (vnode lists, successor lists) gets
/// remotely close to it.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub async fn write_message<W: AsyncWrite + Unpin>(w: &mut W, msg: &Message) -> Result<()> {
    let body = msg.encode()?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::ProtocolViolation("message too large to frame".into()))?;
    w.write_all(&len.to_be_bytes())
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    w.write_all(&body)
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    w.flush().await.map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    Ok(())
}

pub async fn read_message<R: AsyncRead + Unpin>(r: &mut R) -> Result<Message> {
    let (tag, payload) = read_frame(r).await?;
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(tag);
    buf.extend(payload);
    Message::decode(&buf)
}

/// Read one length-prefixed frame without decoding its payload, so a caller
/// can dispatch on the tag byte before deciding whether it names one of the
/// fixed core messages or a third-party extension (§4.5's `TransportHook`).
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<(u8, Vec<u8>)> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(Error::ProtocolViolation(format!(
            "frame of {len} bytes exceeds {MAX_FRAME_BYTES}"
        )));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    let (&tag, payload) = buf
        .split_first()
        .ok_or_else(|| Error::DecodeError("empty frame".into()))?;
    Ok((tag, payload.to_vec()))
}

/// Write a raw `tag || payload` frame, for extension tags that bypass the
/// fixed `Message` encoding.
pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, tag: u8, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(1 + payload.len())
        .map_err(|_| Error::ProtocolViolation("message too large to frame".into()))?;
    w.write_all(&len.to_be_bytes())
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    w.write_all(&[tag])
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    w.write_all(payload)
        .await
        .map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    w.flush().await.map_err(|e| Error::NetworkUnreachable(e.to_string()))?;
    Ok(())
}
