mod common;
use common::*;

use bytes::BytesMut;
use futures::StreamExt;
use omnik_tcp::omnik::packet_decoder::{Decoded, MessageStream, PacketDecoder};
use tokio_util::codec::Decoder;

fn frame(decoded: Option<Decoded>) -> ReplyFrame {
    match decoded {
        Some(Decoded::Frame(frame)) => frame,
        other => panic!("expected a frame, got {:?}", other),
    }
}

#[test]
fn decodes_one_frame() {
    let mut decoder = PacketDecoder::new();
    let mut buf = BytesMut::from(&Factory::information_frame()[..]);

    let decoded = frame(decoder.decode(&mut buf).unwrap());
    assert_eq!(decoded.message_type, u8::from(MessageType::InformationReply));
    assert_eq!(decoded.serial_number, Factory::SERIAL);
    assert_eq!(decoded.payload, Factory::information_payload());
    assert!(buf.is_empty());
}

#[test]
fn waits_for_the_rest_of_a_split_frame() {
    let bytes = Factory::text_frame("split me");
    let mut decoder = PacketDecoder::new();
    let mut buf = BytesMut::new();

    for chunk in bytes[..bytes.len() - 1].chunks(3) {
        buf.extend_from_slice(chunk);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    }

    buf.extend_from_slice(&bytes[bytes.len() - 1..]);
    let decoded = frame(decoder.decode(&mut buf).unwrap());
    assert_eq!(decoded.payload, b"split me");
}

#[test]
fn decodes_back_to_back_frames() {
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&Factory::text_frame("one"));
    buf.extend_from_slice(&Factory::text_frame("two"));

    let mut decoder = PacketDecoder::new();
    assert_eq!(frame(decoder.decode(&mut buf).unwrap()).payload, b"one");
    assert_eq!(frame(decoder.decode(&mut buf).unwrap()).payload, b"two");
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
}

#[test]
fn stream_end_finishes_the_decoder() {
    let mut buf = BytesMut::from(&[MESSAGE_STREAM_END, MESSAGE_STREAM_END][..]);
    buf.extend_from_slice(&Factory::information_frame());

    let mut decoder = PacketDecoder::new();
    assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Decoded::EndOfBurst));
    assert!(decoder.is_finished());

    // whatever follows the terminator is never decoded
    buf.extend_from_slice(&Factory::information_frame());
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    assert!(buf.is_empty());
}

#[test]
fn bad_start_byte() {
    let mut buf = BytesMut::from(&[0x12, 0x00][..]);
    let err = PacketDecoder::new().decode(&mut buf).unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedFrame(_)));
}

#[test]
fn bad_end_byte() {
    let mut bytes = Factory::text_frame("oops");
    let last = bytes.len() - 1;
    bytes[last] = 0x17;

    let mut buf = BytesMut::from(&bytes[..]);
    let err = PacketDecoder::new().decode(&mut buf).unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedFrame(_)));
}

#[test]
fn truncated_at_eof() {
    let bytes = Factory::information_frame();
    let mut buf = BytesMut::from(&bytes[..20]);

    let mut decoder = PacketDecoder::new();
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    let err = decoder.decode_eof(&mut buf).unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedFrame(_)));

    let mut empty = BytesMut::new();
    assert_eq!(PacketDecoder::new().decode_eof(&mut empty).unwrap(), None);
}

#[tokio::test]
async fn stream_yields_frames_in_order() {
    common_setup();

    let bytes = Factory::burst(&[
        Factory::text_frame("first"),
        Factory::information_frame(),
        Factory::text_frame("last"),
    ]);

    let frames: Vec<_> = MessageStream::new(&bytes[..]).collect().await;
    let frames: Vec<ReplyFrame> = frames.into_iter().map(|f| f.unwrap()).collect();

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].payload, b"first");
    assert_eq!(frames[1].kind().unwrap(), MessageType::InformationReply);
    assert_eq!(frames[2].payload, b"last");
}

#[tokio::test]
async fn stream_starting_with_terminator_is_empty() {
    let bytes = [MESSAGE_STREAM_END];
    let mut stream = MessageStream::new(&bytes[..]);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn stream_ends_when_the_peer_closes() {
    // no terminator, just end of stream after a whole frame
    let bytes = Factory::text_frame("bye");
    let mut stream = MessageStream::new(&bytes[..]);

    assert_eq!(stream.next().await.unwrap().unwrap().payload, b"bye");
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn stream_stops_after_the_first_error() {
    let mut bytes = Factory::text_frame("fine");
    let mut bad = Factory::text_frame("corrupt");
    bad[5] ^= 0x01;
    bytes.extend_from_slice(&bad);
    bytes.extend_from_slice(&Factory::text_frame("never seen"));

    let mut stream = MessageStream::new(&bytes[..]);
    assert_eq!(stream.next().await.unwrap().unwrap().payload, b"fine");
    assert!(matches!(
        stream.next().await,
        Some(Err(ProtocolError::ChecksumMismatch { .. }))
    ));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn stream_reports_truncation() {
    let bytes = Factory::information_frame();
    let mut stream = MessageStream::new(&bytes[..bytes.len() - 3]);

    assert!(matches!(
        stream.next().await,
        Some(Err(ProtocolError::MalformedFrame(_)))
    ));
    assert!(stream.next().await.is_none());
}
