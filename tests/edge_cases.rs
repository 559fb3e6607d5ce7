//! Malformed-input edge cases
//!
//! A scripted far end sends hostile packets at a live session and asserts
//! the dispatch rules: answerable problems come back as error replies, and
//! only framing violations tear the session down.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use netron_protocol::core::codec::PacketCodec;
use netron_protocol::core::packet::Packet;
use netron_protocol::error::{constants, kind};
use netron_protocol::peer::{PeerEvent, PeerSession};
use netron_protocol::protocol::dispatcher::TaskDispatcher;
use netron_protocol::protocol::message::{Action, Message};
use netron_protocol::registry::ContextRegistry;
use netron_protocol::{NetronConfig, NetronError, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

fn spawn_session(
    transport: DuplexStream,
    config: NetronConfig,
) -> (Arc<PeerSession>, mpsc::UnboundedReceiver<PeerEvent>) {
    let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
    let session = PeerSession::spawn(
        "hostile-peer",
        transport,
        Arc::new(ContextRegistry::new()),
        Arc::new(TaskDispatcher::new()),
        config,
        lifecycle_tx,
    );
    (session, lifecycle_rx)
}

fn far_end(transport: DuplexStream) -> Framed<DuplexStream, PacketCodec> {
    Framed::new(transport, PacketCodec::default())
}

fn decode_error(packet: &Packet) -> (String, String) {
    match Message::decode(&packet.payload).unwrap() {
        Message::Err(error) => (error.kind, error.message),
        other => panic!("expected an error reply, got {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_payload_yields_error_reply() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, NetronConfig::default());
    let mut framed = far_end(far);

    let garbage = Packet::request(7, Action::Call.code(), Bytes::from_static(&[0xFF; 16])).unwrap();
    framed.send(garbage).await.unwrap();

    let reply = framed.next().await.unwrap().unwrap();
    assert!(!reply.impulse());
    assert_eq!(reply.id, 7);
    assert_eq!(reply.action(), Action::Call.code());
    let (err_kind, _) = decode_error(&reply);
    assert_eq!(err_kind, kind::MALFORMED_PAYLOAD);

    // Not a framing violation; the session survives.
    assert!(session.is_online());
}

#[tokio::test]
async fn test_unknown_action_yields_error_reply() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, NetronConfig::default());
    let mut framed = far_end(far);

    // 0x5A fits the action bits but is not a known action.
    let bogus = Packet::request(5, 0x5A, Message::Ping.encode().unwrap()).unwrap();
    framed.send(bogus).await.unwrap();

    let reply = framed.next().await.unwrap().unwrap();
    assert!(!reply.impulse());
    assert_eq!(reply.id, 5);
    let (err_kind, message) = decode_error(&reply);
    assert_eq!(err_kind, kind::INVALID_ACTION);
    assert_eq!(message, "90");
    assert!(session.is_online());
}

#[tokio::test]
async fn test_action_payload_mismatch_is_rejected() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, NetronConfig::default());
    let mut framed = far_end(far);

    // A PING payload travelling under the GET action byte.
    let mismatched =
        Packet::request(6, Action::Get.code(), Message::Ping.encode().unwrap()).unwrap();
    framed.send(mismatched).await.unwrap();

    let reply = framed.next().await.unwrap().unwrap();
    assert_eq!(reply.id, 6);
    assert_eq!(reply.action(), Action::Get.code());
    let (err_kind, message) = decode_error(&reply);
    assert_eq!(err_kind, kind::MALFORMED_PAYLOAD);
    assert_eq!(message, constants::ERR_ACTION_MISMATCH);
    assert!(session.is_online());
}

#[tokio::test]
async fn test_undecodable_oneway_payload_is_dropped_silently() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, NetronConfig::default());
    let mut framed = far_end(far);

    let garbage =
        Packet::request(3, Action::Event.code(), Bytes::from_static(&[0xAB; 8])).unwrap();
    framed.send(garbage).await.unwrap();

    // No reply for oneway actions; the next ping round-trips normally.
    let probe = Packet::request(4, Action::Ping.code(), Message::Ping.encode().unwrap()).unwrap();
    framed.send(probe).await.unwrap();
    let reply = framed.next().await.unwrap().unwrap();
    assert_eq!(reply.id, 4);
    assert_eq!(
        Message::decode(&reply.payload).unwrap(),
        Message::Ok(Value::Null)
    );
    assert!(session.is_online());
}

#[tokio::test]
async fn test_oversized_inbound_packet_tears_down_the_session() {
    let (local, far) = tokio::io::duplex(16 * 1024);
    let config = NetronConfig::default_with_overrides(|c| c.max_payload_size = 64);
    let (session, mut lifecycle) = spawn_session(local, config);
    // The far end frames with the default ceiling, so it can overshoot the
    // session's limit.
    let mut framed = far_end(far);

    let oversized = Packet::request(
        1,
        Action::Call.code(),
        Bytes::from(vec![0u8; 1024]),
    )
    .unwrap();
    framed.send(oversized).await.unwrap();

    // Framing is unrecoverable mid-stream; the session goes offline.
    match tokio::time::timeout(Duration::from_secs(1), lifecycle.recv()).await {
        Ok(Some(PeerEvent::Offline { .. })) => {}
        other => panic!("expected offline notification, got {other:?}"),
    }
    assert!(matches!(
        session.ping().await,
        Err(NetronError::PeerDisconnected)
    ));
}
