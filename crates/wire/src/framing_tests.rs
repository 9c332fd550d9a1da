// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample_header() -> FrameHeader {
    FrameHeader {
        message_type: MessageType::TerminalBytes,
        flags: 0,
        channel: 3,
        stream_id: 42,
        offset: 128,
        payload_len: 5,
    }
}

#[test]
fn encode_decode_round_trips() {
    let header = sample_header();
    let bytes = header.encode();
    assert_eq!(bytes.len(), HEADER_LEN);
    let decoded = FrameHeader::decode(&bytes).unwrap();
    assert_eq!(decoded, header);
}

#[test]
fn decode_rejects_bad_magic() {
    let mut bytes = sample_header().encode();
    bytes[0] = b'X';
    assert!(matches!(FrameHeader::decode(&bytes), Err(ProtocolError::BadMagic(_))));
}

#[test]
fn decode_rejects_unsupported_version() {
    let mut bytes = sample_header().encode();
    bytes[2] = 99;
    assert!(matches!(FrameHeader::decode(&bytes), Err(ProtocolError::UnsupportedVersion(99))));
}

#[test]
fn decode_rejects_oversized_payload_len() {
    let mut header = sample_header();
    header.payload_len = MAX_PAYLOAD_LEN + 1;
    let bytes = header.encode();
    assert!(matches!(FrameHeader::decode(&bytes), Err(ProtocolError::PayloadTooLarge(_))));
}

#[test]
fn has_more_reflects_flag() {
    let mut header = sample_header();
    assert!(!header.has_more());
    header.flags |= flags::MORE;
    assert!(header.has_more());
}

#[tokio::test]
async fn write_then_read_frame_round_trips() {
    let header = FrameHeader {
        message_type: MessageType::Json,
        flags: 0,
        channel: 1,
        stream_id: 7,
        offset: 0,
        payload_len: 4,
    };
    let mut buf = Vec::new();
    write_frame(&mut buf, &header, b"ping").await.unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let (decoded, payload) = read_frame(&mut cursor).await.unwrap();
    assert_eq!(decoded, header);
    assert_eq!(payload, b"ping");
}

#[tokio::test]
async fn write_frame_rejects_oversized_payload() {
    let header = sample_header();
    let payload = vec![0u8; (MAX_PAYLOAD_LEN as usize) + 1];
    let mut buf = Vec::new();
    let err = write_frame(&mut buf, &header, &payload).await.unwrap_err();
    assert!(matches!(err, ProtocolError::PayloadTooLarge(_)));
}
