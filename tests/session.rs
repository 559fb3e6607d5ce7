//! Peer session integration tests
//!
//! Drives a real session over an in-memory duplex transport, with the far
//! end scripted packet by packet, to validate request correlation, timeout
//! bookkeeping, and disconnect semantics.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use futures::{SinkExt, StreamExt};
use netron_protocol::core::codec::PacketCodec;
use netron_protocol::core::packet::Packet;
use netron_protocol::peer::{PeerEvent, PeerSession, PeerState};
use netron_protocol::protocol::dispatcher::TaskDispatcher;
use netron_protocol::protocol::message::{Action, Message};
use netron_protocol::registry::ContextRegistry;
use netron_protocol::{NetronConfig, NetronError, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

fn test_config(response_timeout: Duration) -> NetronConfig {
    NetronConfig::default_with_overrides(|c| c.response_timeout = response_timeout)
}

fn spawn_session(
    transport: DuplexStream,
    config: NetronConfig,
) -> (Arc<PeerSession>, mpsc::UnboundedReceiver<PeerEvent>) {
    let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
    let session = PeerSession::spawn(
        "test-peer",
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

fn ok_reply(id: u32, action: u8, value: Value) -> Packet {
    Packet::reply(id, action, Message::Ok(value).encode().unwrap()).unwrap()
}

#[tokio::test]
async fn test_replies_correlate_out_of_order() {
    let (local, far) = tokio::io::duplex(64 * 1024);
    let (session, _lifecycle) = spawn_session(local, test_config(Duration::from_secs(5)));
    let mut framed = far_end(far);

    // Collect three requests, answer them in reverse arrival order.
    let driver = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(framed.next().await.unwrap().unwrap());
        }
        requests.reverse();
        for request in requests {
            assert!(request.impulse());
            let message = Message::decode(&request.payload).unwrap();
            let Message::Call { args, .. } = message else {
                panic!("expected a call request");
            };
            let n = args[0].as_i64().unwrap();
            framed
                .send(ok_reply(request.id, request.action(), Value::Int(n * 10)))
                .await
                .unwrap();
        }
        framed
    });

    let (a, b, c) = tokio::join!(
        session.call(1, "mul", vec![Value::Int(1)]),
        session.call(1, "mul", vec![Value::Int(2)]),
        session.call(1, "mul", vec![Value::Int(3)]),
    );
    assert_eq!(a.unwrap().as_i64(), Some(10));
    assert_eq!(b.unwrap().as_i64(), Some(20));
    assert_eq!(c.unwrap().as_i64(), Some(30));
    assert_eq!(session.pending_count(), 0);

    let _framed = driver.await.unwrap();
}

#[tokio::test]
async fn test_stale_reply_is_ignored() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, test_config(Duration::from_secs(5)));
    let mut framed = far_end(far);

    // A reply nobody is waiting on.
    framed
        .send(ok_reply(9999, Action::Ping.code(), Value::Null))
        .await
        .unwrap();

    // The session keeps serving afterwards.
    let echo = tokio::spawn(async move {
        let request = framed.next().await.unwrap().unwrap();
        framed
            .send(ok_reply(request.id, request.action(), Value::Null))
            .await
            .unwrap();
        framed
    });

    session.ping().await.unwrap();
    assert_eq!(session.pending_count(), 0);
    assert!(session.is_online());

    let _framed = echo.await.unwrap();
}

#[tokio::test]
async fn test_timeout_rejects_and_late_reply_is_a_noop() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, test_config(Duration::from_millis(50)));
    let mut framed = far_end(far);

    let err = session.ping().await.unwrap_err();
    assert!(matches!(err, NetronError::RequestTimeout));
    assert_eq!(session.pending_count(), 0);

    // The request is still sitting on the wire; answer it after the fact.
    let request = framed.next().await.unwrap().unwrap();
    framed
        .send(ok_reply(request.id, request.action(), Value::Null))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The late reply neither crashes the session nor resurrects the request.
    assert!(session.is_online());
    assert_eq!(session.pending_count(), 0);
}

#[tokio::test]
async fn test_disconnect_rejects_pending_and_notifies_once() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, mut lifecycle) = spawn_session(local, test_config(Duration::from_secs(30)));
    let mut framed = far_end(far);

    let in_flight = {
        let session = session.clone();
        tokio::spawn(async move { session.ping().await })
    };
    // Wait until the request is actually on the wire.
    let _request = framed.next().await.unwrap().unwrap();
    assert_eq!(session.pending_count(), 1);

    // Remote hangs up.
    drop(framed);

    let result = in_flight.await.unwrap();
    assert!(matches!(result, Err(NetronError::PeerDisconnected)));
    assert_eq!(session.pending_count(), 0);

    match lifecycle.recv().await {
        Some(PeerEvent::Offline { uid }) => assert_eq!(uid, "test-peer"),
        other => panic!("expected offline notification, got {other:?}"),
    }
    assert_eq!(session.state(), PeerState::Offline);

    // Further requests fail fast.
    assert!(matches!(
        session.ping().await,
        Err(NetronError::PeerDisconnected)
    ));

    // Teardown is idempotent; no second notification.
    session.disconnect();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(lifecycle.try_recv().is_err());
}

#[tokio::test]
async fn test_fast_echo_never_loses_replies() {
    let (local, far) = tokio::io::duplex(64 * 1024);
    let (session, _lifecycle) = spawn_session(local, test_config(Duration::from_secs(5)));
    let mut framed = far_end(far);

    // The pending entry is registered before the write, so even an
    // immediate echo always finds it.
    let echo = tokio::spawn(async move {
        while let Some(Ok(request)) = framed.next().await {
            let reply = ok_reply(request.id, request.action(), Value::Null);
            if framed.send(reply).await.is_err() {
                break;
            }
        }
    });

    for _ in 0..100 {
        session.ping().await.unwrap();
    }
    assert_eq!(session.pending_count(), 0);

    session.disconnect();
    let _ = echo.await;
}

#[tokio::test]
async fn test_inbound_subscribe_is_acknowledged_and_recorded() {
    let (local, far) = tokio::io::duplex(4096);
    let (session, _lifecycle) = spawn_session(local, test_config(Duration::from_secs(5)));
    let mut framed = far_end(far);

    let subscribe = Packet::request(
        1,
        Action::Subscribe.code(),
        Message::Subscribe {
            event: "tick".into(),
        }
        .encode()
        .unwrap(),
    )
    .unwrap();
    framed.send(subscribe).await.unwrap();

    let ack = framed.next().await.unwrap().unwrap();
    assert!(!ack.impulse());
    assert_eq!(ack.id, 1);
    assert_eq!(Message::decode(&ack.payload).unwrap(), Message::Ok(Value::Null));
    assert!(session.is_subscribed("tick"));

    let unsubscribe = Packet::request(
        2,
        Action::Unsubscribe.code(),
        Message::Unsubscribe {
            event: "tick".into(),
        }
        .encode()
        .unwrap(),
    )
    .unwrap();
    framed.send(unsubscribe).await.unwrap();
    let ack = framed.next().await.unwrap().unwrap();
    assert_eq!(ack.id, 2);
    assert!(!session.is_subscribed("tick"));
}
