// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary multiplex framing for the `/ws` transport (`§4.4`, `§6.1`).
//!
//! Most traffic on a connection is a single JSON text frame per message, but
//! terminal I/O and large diff payloads are split across a logical stream so
//! several can interleave on one socket without head-of-line blocking. Each
//! chunk is prefixed with a fixed 24-byte header; the payload that follows is
//! either a JSON document (`MessageType::Json`) or raw terminal bytes
//! (`MessageType::TerminalBytes`).

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAGIC: [u8; 2] = *b"PX";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 24;

/// Largest payload a single frame may carry. Larger transfers (e.g. a
/// `request_download_token` file body) are split across multiple frames on
/// the same `stream_id` with `flags::MORE` set on all but the last.
pub const MAX_PAYLOAD_LEN: u32 = 8 * 1024 * 1024;

pub mod flags {
    /// More frames follow on this `stream_id`; absence marks the final chunk.
    pub const MORE: u8 = 0b0000_0001;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Json = 0,
    TerminalBytes = 1,
}

impl MessageType {
    fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            0 => Ok(MessageType::Json),
            1 => Ok(MessageType::TerminalBytes),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("bad magic bytes: {0:02x?}")]
    BadMagic([u8; 2]),
    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u8),
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("payload length {0} exceeds max {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(u32),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e.to_string())
    }
}

/// The 24-byte header prefixing every multiplex frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub message_type: MessageType,
    pub flags: u8,
    pub channel: u8,
    pub stream_id: u32,
    /// Byte offset of this chunk within the logical stream.
    pub offset: u64,
    pub payload_len: u32,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&MAGIC);
        buf[2] = VERSION;
        buf[3] = self.message_type as u8;
        buf[4] = self.flags;
        buf[5] = self.channel;
        buf[6..8].copy_from_slice(&[0, 0]);
        buf[8..12].copy_from_slice(&self.stream_id.to_be_bytes());
        buf[12..20].copy_from_slice(&self.offset.to_be_bytes());
        buf[20..24].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        let magic = [buf[0], buf[1]];
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }
        let version = buf[2];
        if version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let message_type = MessageType::from_u8(buf[3])?;
        let flags = buf[4];
        let channel = buf[5];
        #[allow(clippy::expect_used)]
        let stream_id = u32::from_be_bytes(buf[8..12].try_into().expect("4-byte slice"));
        #[allow(clippy::expect_used)]
        let offset = u64::from_be_bytes(buf[12..20].try_into().expect("8-byte slice"));
        #[allow(clippy::expect_used)]
        let payload_len = u32::from_be_bytes(buf[20..24].try_into().expect("4-byte slice"));
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(payload_len));
        }
        Ok(Self { message_type, flags, channel, stream_id, offset, payload_len })
    }

    pub fn has_more(&self) -> bool {
        self.flags & flags::MORE != 0
    }
}

/// Writes a header followed by `payload` to `w`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    header: &FrameHeader,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() as u64 > MAX_PAYLOAD_LEN as u64 {
        return Err(ProtocolError::PayloadTooLarge(payload.len() as u32));
    }
    w.write_all(&header.encode()).await?;
    w.write_all(payload).await?;
    w.flush().await?;
    Ok(())
}

/// Reads one header + payload pair from `r`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    r: &mut R,
) -> Result<(FrameHeader, Vec<u8>), ProtocolError> {
    let mut header_buf = [0u8; HEADER_LEN];
    r.read_exact(&mut header_buf).await?;
    let header = FrameHeader::decode(&header_buf)?;
    let mut payload = vec![0u8; header.payload_len as usize];
    r.read_exact(&mut payload).await?;
    Ok((header, payload))
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
