// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary multiplex channel assignment (`spec.md` §4.4, §6.1, §8 scenario 6).
//!
//! `paseo-wire::framing` defines the header shape; this module is the
//! daemon-local policy for which `channel`/`stream_id` a piece of terminal
//! output rides on, and assigns each subscribed terminal its own stream so
//! several can interleave on one socket without head-of-line blocking.

use paseo_wire::framing::{self, FrameHeader, MessageType};

/// Binary-multiplex channel carrying terminal PTY output.
pub const CHANNEL_TERMINAL: u8 = 0;
/// Binary-multiplex channel carrying `request_download_token` file bodies.
pub const CHANNEL_FILE_TRANSFER: u8 = 1;

/// Builds the header+payload pair for one chunk of raw terminal output.
/// `offset` is the byte offset of `payload`'s first byte within the logical
/// per-terminal-subscription stream; callers track and advance it.
pub fn terminal_output_frame(stream_id: u32, offset: u64, payload: &[u8]) -> (FrameHeader, Vec<u8>) {
    let header = FrameHeader {
        message_type: MessageType::TerminalBytes,
        flags: 0,
        channel: CHANNEL_TERMINAL,
        stream_id,
        offset,
        payload_len: payload.len() as u32,
    };
    (header, payload.to_vec())
}

/// Peeks the first `HEADER_LEN` bytes of a binary WS frame to confirm it's a
/// multiplex frame before fully decoding it (`spec.md` §4.4: "the hub peeks
/// the first 3 bytes of every binary frame to decide whether to treat it as
/// multiplexed").
pub fn looks_multiplexed(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0..2] == framing::MAGIC && bytes[2] == framing::VERSION
}

/// Decodes one complete multiplex frame from an already-buffered binary WS
/// message (the whole frame always arrives in a single WS binary message on
/// this transport, unlike the length-delimited stream framing `paseo-wire`
/// also supports over a raw socket).
pub fn decode(bytes: &[u8]) -> Result<(FrameHeader, &[u8]), framing::ProtocolError> {
    if bytes.len() < framing::HEADER_LEN {
        return Err(framing::ProtocolError::Io("frame shorter than header".to_string()));
    }
    let mut header_buf = [0u8; framing::HEADER_LEN];
    header_buf.copy_from_slice(&bytes[..framing::HEADER_LEN]);
    let header = FrameHeader::decode(&header_buf)?;
    let payload = &bytes[framing::HEADER_LEN..];
    if payload.len() != header.payload_len as usize {
        return Err(framing::ProtocolError::Io(format!(
            "payload length mismatch: header says {}, got {}",
            header.payload_len,
            payload.len()
        )));
    }
    Ok((header, payload))
}

/// Encodes a complete multiplex frame (header + payload) as one WS binary
/// message.
pub fn encode(header: &FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut buf = header.encode().to_vec();
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_output_frame_has_expected_header_fields() {
        let (header, payload) = terminal_output_frame(7, 128, b"hello");
        assert_eq!(header.channel, CHANNEL_TERMINAL);
        assert_eq!(header.stream_id, 7);
        assert_eq!(header.offset, 128);
        assert_eq!(header.payload_len, 5);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let (header, payload) = terminal_output_frame(1, 0, b"abc");
        let bytes = encode(&header, &payload);
        assert!(looks_multiplexed(&bytes));
        let (decoded_header, decoded_payload) = decode(&bytes).expect("decodes");
        assert_eq!(decoded_header, header);
        assert_eq!(decoded_payload, b"abc");
    }

    #[test]
    fn looks_multiplexed_rejects_short_or_wrong_magic() {
        assert!(!looks_multiplexed(b"ab"));
        assert!(!looks_multiplexed(b"XX\x01"));
    }
}
