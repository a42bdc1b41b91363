//! End-to-end scenarios against a real ROUTER socket, with a fake DEALER
//! worker standing in for `relaymq-worker` so this crate's tests don't
//! need to depend on it. Mirrors the teacher's `zmq_roundtrip` test style
//! (`hooteproto/tests/zmq_roundtrip.rs`).

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relaymq_dispatcher::Dispatcher;
use relaymq_proto::socket_config::{Multipart, ZmqContext};
use relaymq_proto::{decode_inbound, encode_control, encode_reply, ControlPacket, InboundGroup};
use tmq::dealer;

static PORT: AtomicU16 = AtomicU16::new(23500);

fn next_endpoint() -> String {
    let port = PORT.fetch_add(1, Ordering::SeqCst);
    format!("tcp://127.0.0.1:{port}")
}

fn to_multipart(frames: Vec<Bytes>) -> Multipart {
    frames.into_iter().map(|f| f.to_vec()).collect::<Vec<_>>().into()
}

fn from_multipart(mp: Multipart) -> Vec<Bytes> {
    mp.into_iter().map(|m| Bytes::from(m.to_vec())).collect()
}

/// Scenario 1 (spec §8): one worker, identity handler, single round trip.
#[tokio::test]
async fn single_worker_round_trip() {
    let endpoint = next_endpoint();
    let dispatcher = Dispatcher::bind(&endpoint).await.unwrap();

    let ctx = ZmqContext::new();
    let mut worker = dealer(&ctx)
        .set_identity(b"worker-0")
        .connect(&endpoint)
        .unwrap();

    worker
        .send(to_multipart(encode_control(&ControlPacket::hello(Bytes::from_static(b"worker-0")))))
        .await
        .unwrap();

    // Give the loop time to process HELLO before submitting.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(dispatcher.active_worker_count().await, 1);

    let deferred = dispatcher
        .submit(Bytes::from_static(b"req-0"), Bytes::from_static(b"JobData-0"))
        .await
        .unwrap();

    let request = from_multipart(worker.next().await.unwrap().unwrap());
    let group = decode_inbound(&request).unwrap();
    let body = match group {
        InboundGroup::Reply(body) => body,
        InboundGroup::Control(_) => panic!("worker should see a request group"),
    };
    assert_eq!(body.correlation_id, Bytes::from_static(b"req-0"));
    assert_eq!(body.payload, Bytes::from_static(b"JobData-0"));

    let handled = format!("Handled({})", String::from_utf8(body.payload.to_vec()).unwrap());
    worker
        .send(to_multipart(encode_reply(body.correlation_id, Bytes::from(handled.clone()))))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_millis(500), deferred)
        .await
        .expect("deferred should resolve within 500ms")
        .unwrap()
        .unwrap();
    assert_eq!(reply, Bytes::from(handled));

    dispatcher.shutdown().await;
}

/// Boundary behavior (spec §8): submit with zero workers fails synchronously.
#[tokio::test]
async fn submit_with_no_workers_fails_synchronously() {
    let endpoint = next_endpoint();
    let dispatcher = Dispatcher::bind(&endpoint).await.unwrap();

    let result = dispatcher.submit(Bytes::from_static(b"req"), Bytes::from_static(b"x")).await;
    assert!(result.is_err());

    dispatcher.shutdown().await;
}

/// Scenario 5 (spec §8): duplicate correlation id is rejected while the
/// first is still pending.
#[tokio::test]
async fn duplicate_correlation_id_is_rejected() {
    let endpoint = next_endpoint();
    let dispatcher = Dispatcher::bind(&endpoint).await.unwrap();

    let ctx = ZmqContext::new();
    let mut worker = dealer(&ctx).set_identity(b"w0").connect(&endpoint).unwrap();
    worker
        .send(to_multipart(encode_control(&ControlPacket::hello(Bytes::from_static(b"w0")))))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let _first = dispatcher
        .submit(Bytes::from_static(b"dup"), Bytes::from_static(b"a"))
        .await
        .unwrap();
    let second = dispatcher
        .submit(Bytes::from_static(b"dup"), Bytes::from_static(b"b"))
        .await;
    assert!(second.is_err());

    dispatcher.shutdown().await;
}

/// Spec §8 round-robin fairness: a rejected duplicate-id submit must not
/// consume a cursor slot, since no request was actually routed anywhere.
#[tokio::test]
async fn rejected_duplicate_does_not_skip_a_worker_turn() {
    let endpoint = next_endpoint();
    let dispatcher = Dispatcher::bind(&endpoint).await.unwrap();

    let ctx = ZmqContext::new();
    let mut worker_a = dealer(&ctx).set_identity(b"a").connect(&endpoint).unwrap();
    worker_a
        .send(to_multipart(encode_control(&ControlPacket::hello(Bytes::from_static(b"a")))))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut worker_b = dealer(&ctx).set_identity(b"b").connect(&endpoint).unwrap();
    worker_b
        .send(to_multipart(encode_control(&ControlPacket::hello(Bytes::from_static(b"b")))))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(dispatcher.active_worker_count().await, 2);

    // First submit picks worker "a" (insertion order).
    let _first = dispatcher
        .submit(Bytes::from_static(b"dup"), Bytes::from_static(b"x"))
        .await
        .unwrap();
    let _ = from_multipart(worker_a.next().await.unwrap().unwrap());

    // A rejected duplicate must not advance the round-robin cursor.
    let rejected = dispatcher
        .submit(Bytes::from_static(b"dup"), Bytes::from_static(b"y"))
        .await;
    assert!(rejected.is_err());

    // The next distinct submit should still land on worker "b", exactly as
    // if the rejected duplicate attempt had never happened.
    let _second = dispatcher
        .submit(Bytes::from_static(b"fresh"), Bytes::from_static(b"z"))
        .await
        .unwrap();
    let request = tokio::time::timeout(Duration::from_millis(500), worker_b.next())
        .await
        .expect("worker b should receive the next request")
        .unwrap()
        .unwrap();
    let frames = from_multipart(request);
    let group = decode_inbound(&frames).unwrap();
    match group {
        InboundGroup::Reply(body) => assert_eq!(body.correlation_id, Bytes::from_static(b"fresh")),
        InboundGroup::Control(_) => panic!("worker should see a request group"),
    }

    dispatcher.shutdown().await;
}

/// Scenario 6 (spec §8): shutdown fails outstanding deferreds with SHUTDOWN.
#[tokio::test]
async fn shutdown_resolves_pending_with_shutdown_failure() {
    let endpoint = next_endpoint();
    let dispatcher = Dispatcher::bind(&endpoint).await.unwrap();

    let ctx = ZmqContext::new();
    let mut worker = dealer(&ctx).set_identity(b"w0").connect(&endpoint).unwrap();
    worker
        .send(to_multipart(encode_control(&ControlPacket::hello(Bytes::from_static(b"w0")))))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let deferred = dispatcher
        .submit(Bytes::from_static(b"pending-1"), Bytes::from_static(b"x"))
        .await
        .unwrap();

    dispatcher.shutdown().await;

    let outcome = deferred.await.unwrap();
    assert!(outcome.is_err());
}

/// Spec §5: "H < cutoff/2" guards the normal case, but a dispatcher
/// configured with a request timeout *longer* than its inactivity cutoff
/// must not leave a request pending past the point its recipient was
/// swept from the fleet - the sweep has to fail bound requests itself
/// rather than relying on the (much later) deadline.
#[tokio::test]
async fn worker_swept_for_inactivity_fails_its_bound_pending_requests_early() {
    let endpoint = next_endpoint();
    let dispatcher = Dispatcher::bind_with_config(
        &endpoint,
        Duration::from_secs(5),
        Duration::from_millis(150),
    )
    .await
    .unwrap();

    let ctx = ZmqContext::new();
    let mut worker = dealer(&ctx).set_identity(b"w0").connect(&endpoint).unwrap();
    worker
        .send(to_multipart(encode_control(&ControlPacket::hello(Bytes::from_static(b"w0")))))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let deferred = dispatcher
        .submit(Bytes::from_static(b"req-sweep"), Bytes::from_static(b"x"))
        .await
        .unwrap();
    let _request = from_multipart(worker.next().await.unwrap().unwrap());

    // Worker goes silent (no reply, no further heartbeat) past the cutoff,
    // well short of the 5s request timeout.
    let outcome = tokio::time::timeout(Duration::from_millis(750), deferred)
        .await
        .expect("sweep should fail the pending request long before the 5s deadline")
        .unwrap();
    assert!(outcome.is_err());
    assert_eq!(dispatcher.active_worker_count().await, 0);

    dispatcher.shutdown().await;
}
