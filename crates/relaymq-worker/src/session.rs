//! The worker session machine (spec §4.B): connect, register, serve
//! requests, emit idle heartbeats, say goodbye.
//!
//! Collapsed into a single cooperative task multiplexing receive and the
//! heartbeat timer, per spec §9's "background threads vs. cooperative
//! tasks" note - this sidesteps the socket-sharing hazard the spec
//! otherwise requires a per-session mutex for, since only one task ever
//! touches the DEALER socket.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relaymq_proto::socket_config::{DealerSocket, Multipart, ZmqContext};
use relaymq_proto::{decode_request, encode_control, encode_reply, ControlPacket};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Prefix a reply carries when the user handler panicked, so a failed
/// request resolves on the next round-trip instead of riding out the full
/// dispatcher timeout (spec §7, HANDLER_FAULT policy).
pub const HANDLER_FAULT_PREFIX: &[u8] = b"\0relaymq:handler-fault\0";

/// Heartbeat suppression ticks at this cadence; idle threshold is checked
/// against the configured heartbeat interval on each tick.
const HEARTBEAT_TICK: Duration = Duration::from_secs(1);

pub type Handler = Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>;

pub(crate) enum Command {
    Shutdown,
}

fn frames_from_multipart(mp: Multipart) -> Vec<Bytes> {
    mp.into_iter().map(|m| Bytes::from(m.to_vec())).collect()
}

fn multipart_from_frames(frames: Vec<Bytes>) -> Multipart {
    frames.into_iter().map(|f| f.to_vec()).collect::<Vec<_>>().into()
}

fn invoke_handler(handler: &RwLock<Option<Handler>>, payload: Bytes) -> Bytes {
    let handler = handler.read().expect("handler lock poisoned").clone();
    let Some(handler) = handler else {
        warn!("request received with no handler registered");
        return Bytes::from_static(HANDLER_FAULT_PREFIX);
    };

    match std::panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
        Ok(result) => result,
        Err(_) => {
            warn!("request handler panicked, replying with fault marker");
            Bytes::from_static(HANDLER_FAULT_PREFIX)
        }
    }
}

pub(crate) async fn run(
    _ctx: ZmqContext,
    mut socket: impl DealerSocket,
    identity: Bytes,
    heartbeat_interval: Duration,
    handler: Arc<RwLock<Option<Handler>>>,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    let mut last_activity = Instant::now();
    let mut ticker = tokio::time::interval(HEARTBEAT_TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    if socket
        .send(multipart_from_frames(encode_control(&ControlPacket::hello(identity.clone()))))
        .await
        .is_err()
    {
        warn!("failed to send HELLO, worker session aborting");
        return;
    }
    debug!("worker session started");

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => {
                        let _ = socket
                            .send(multipart_from_frames(encode_control(&ControlPacket::bye(identity.clone()))))
                            .await;
                        break;
                    }
                }
            }

            inbound = socket.next() => {
                match inbound {
                    Some(Ok(multipart)) => {
                        last_activity = Instant::now();
                        let frames = frames_from_multipart(multipart);
                        // A worker only ever receives request groups here
                        // (dispatcher->worker), never control traffic, so
                        // this decodes the fixed [delimiter, correlation_id,
                        // payload] shape directly rather than routing
                        // through the control-kind check - a one-byte
                        // correlation id equal to a kind byte must still be
                        // a request, not a misclassified HELLO/PING/BYE.
                        match decode_request(&frames) {
                            Ok(body) => {
                                trace!("request received, invoking handler");
                                let result = invoke_handler(&handler, body.payload);
                                let reply = encode_reply(body.correlation_id, result);
                                if socket.send(multipart_from_frames(reply)).await.is_err() {
                                    warn!("failed to send reply");
                                }
                                last_activity = Instant::now();
                            }
                            Err(e) => {
                                warn!(error = %e, "dropping malformed request group");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "dealer socket receive error, continuing");
                    }
                    None => {
                        warn!("dealer socket stream ended unexpectedly");
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if last_activity.elapsed() > heartbeat_interval {
                    let ping = encode_control(&ControlPacket::ping(identity.clone()));
                    if socket.send(multipart_from_frames(ping)).await.is_err() {
                        warn!("failed to send heartbeat ping");
                    } else {
                        trace!("idle heartbeat sent");
                    }
                    last_activity = Instant::now();
                }
            }
        }
    }

    debug!("worker session exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invoke_handler_with_no_handler_registered_returns_fault_prefix() {
        let slot: Arc<RwLock<Option<Handler>>> = Arc::new(RwLock::new(None));
        let result = invoke_handler(&slot, Bytes::from_static(b"payload"));
        assert_eq!(result, Bytes::from_static(HANDLER_FAULT_PREFIX));
    }

    #[test]
    fn invoke_handler_runs_registered_handler() {
        let slot: Arc<RwLock<Option<Handler>>> = Arc::new(RwLock::new(Some(Arc::new(|payload: Bytes| {
            let mut out = b"Handled(".to_vec();
            out.extend_from_slice(&payload);
            out.push(b')');
            Bytes::from(out)
        }))));
        let result = invoke_handler(&slot, Bytes::from_static(b"JobData-0"));
        assert_eq!(result, Bytes::from_static(b"Handled(JobData-0)"));
    }

    #[test]
    fn invoke_handler_catches_panics_and_returns_fault_prefix() {
        let slot: Arc<RwLock<Option<Handler>>> = Arc::new(RwLock::new(Some(Arc::new(|_: Bytes| {
            panic!("boom")
        }))));
        let result = invoke_handler(&slot, Bytes::from_static(b"x"));
        assert_eq!(result, Bytes::from_static(HANDLER_FAULT_PREFIX));
    }

    #[test]
    fn frame_multipart_roundtrip_preserves_bytes() {
        let frames = vec![Bytes::new(), Bytes::from_static(b"id"), Bytes::from_static(b"payload")];
        let mp = multipart_from_frames(frames.clone());
        let back = frames_from_multipart(mp);
        assert_eq!(frames, back);
    }
}
