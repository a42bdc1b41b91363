//! The dispatcher's single I/O thread (spec §4.E): polls the ROUTER
//! socket, classifies inbound frames, and periodically sweeps expired
//! requests and stale workers.
//!
//! Socket ownership follows the teacher's reactor pattern
//! (`hooteproto::client::reactor_task`): one task owns the socket
//! exclusively, and the public API reaches it through a command channel
//! rather than sharing the socket across threads. `submit` still performs
//! its worker pick and pending-table insert atomically under the shared
//! state lock (spec §4.F); only the actual socket write is handed off to
//! this task, which is the one place besides the loop itself allowed to
//! touch the socket (spec §5). See DESIGN.md for why this resolves the
//! spec's "lock held during submit emission" language without requiring a
//! thread-unsafe socket handle in two places at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relaymq_proto::socket_config::{create_router_and_bind, Multipart, RouterSocket, ZmqContext};
use relaymq_proto::{decode_inbound, InboundGroup};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

use crate::fleet::Fleet;
use crate::pending::PendingTable;

/// Poll wait bound for the socket (spec §4.E step 1).
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) struct SharedState {
    pub fleet: Fleet,
    pub pending: PendingTable,
}

impl SharedState {
    pub fn new(cutoff: Duration) -> Self {
        Self {
            fleet: Fleet::with_cutoff(cutoff),
            pending: PendingTable::new(),
        }
    }
}

/// Commands the public API hands to the loop task.
pub(crate) enum LoopCommand {
    /// Send a pre-addressed request group. The caller has already picked
    /// the recipient and registered the pending entry under the shared
    /// lock; this is purely the socket write.
    SendRequest { frames: Vec<Bytes> },
    Shutdown,
}

/// Spawn the dispatcher loop task. Returns the command channel and the
/// join handle so the public API can send commands and await clean
/// shutdown.
pub(crate) fn spawn(
    endpoint: String,
    state: Arc<Mutex<SharedState>>,
) -> anyhow::Result<(mpsc::Sender<LoopCommand>, tokio::task::JoinHandle<()>)> {
    let ctx = ZmqContext::new();
    let socket = create_router_and_bind(&ctx, &endpoint)?;
    let (cmd_tx, cmd_rx) = mpsc::channel(256);

    let handle = tokio::spawn(run(ctx, socket, cmd_rx, state));
    Ok((cmd_tx, handle))
}

async fn run(
    _ctx: ZmqContext,
    mut socket: impl RouterSocket,
    mut cmd_rx: mpsc::Receiver<LoopCommand>,
    state: Arc<Mutex<SharedState>>,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(LoopCommand::SendRequest { frames }) => {
                        let multipart: Multipart = frames.iter().map(|f| f.to_vec()).collect::<Vec<_>>().into();
                        if let Err(e) = socket.send(multipart).await {
                            warn!(error = %e, "failed to send request group to worker");
                        }
                    }
                    Some(LoopCommand::Shutdown) | None => {
                        let mut guard = state.lock().await;
                        guard.pending.drain_on_shutdown();
                        break;
                    }
                }
            }

            inbound = socket.next() => {
                match inbound {
                    Some(Ok(multipart)) => handle_inbound(multipart, &state).await,
                    Some(Err(e)) => warn!(error = %e, "router socket receive error"),
                    None => {
                        warn!("router socket stream ended unexpectedly");
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                let now = Instant::now();
                let mut guard = state.lock().await;
                let expired = guard.pending.sweep_deadlines(now);
                if expired > 0 {
                    debug!(count = expired, "requests timed out");
                }
                let swept = guard.fleet.sweep(now);
                if !swept.is_empty() {
                    debug!(count = swept.len(), "workers evicted for inactivity");
                    for identity in &swept {
                        guard.pending.fail_recipient(identity);
                    }
                }
            }
        }
    }
}

async fn handle_inbound(multipart: Multipart, state: &Arc<Mutex<SharedState>>) {
    // The ROUTER socket injects the routing identity as the first frame;
    // everything after it is the content group the codec understands.
    let frames: Vec<Bytes> = multipart.into_iter().map(|m| Bytes::from(m.to_vec())).collect();
    if frames.is_empty() {
        return;
    }
    let routing_identity = frames[0].clone();
    let content = &frames[1..];

    let group = match decode_inbound(content) {
        Ok(group) => group,
        Err(e) => {
            warn!(error = %e, "dropping malformed inbound frame group");
            return;
        }
    };

    let mut guard = state.lock().await;
    match group {
        InboundGroup::Control(packet) => match packet.kind {
            relaymq_proto::ControlKind::Hello => guard.fleet.admit(packet.identity),
            relaymq_proto::ControlKind::Ping => guard.fleet.touch(packet.identity),
            relaymq_proto::ControlKind::Bye => {
                guard.fleet.remove(&packet.identity);
                let failed = guard.pending.fail_recipient(&packet.identity);
                if failed > 0 {
                    debug!(count = failed, "failed in-flight requests bound to departed worker");
                }
            }
        },
        InboundGroup::Reply(body) => {
            guard.fleet.touch(routing_identity);
            trace!("reply received, completing pending entry");
            guard.pending.complete(&body.correlation_id, body.payload);
        }
    }
}
