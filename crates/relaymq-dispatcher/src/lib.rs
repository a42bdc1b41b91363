//! relaymq-dispatcher - the broker half of the relaymq RPC system.
//!
//! Owns the fleet registry ([`fleet`]), the pending-request table
//! ([`pending`]), and the single-threaded event loop ([`event_loop`]) that
//! multiplexes control traffic, outgoing requests, and inbound replies
//! over a ZMQ ROUTER socket (spec §4.E). [`Dispatcher`] is the public
//! surface (spec §4.F, §6).

mod event_loop;
pub mod fleet;
pub mod pending;

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use error::SubmitError;
use event_loop::{LoopCommand, SharedState};
use pending::DuplicateId;
pub use pending::{Deferred, ReplyError, ReplyResult};

/// Default per-request timeout (spec §4.D).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Default worker inactivity cutoff (spec §4.C).
pub const DEFAULT_INACTIVITY_CUTOFF: Duration = Duration::from_secs(10);

/// The asymmetric RPC broker: accepts worker connections, fans out
/// requests round-robin, and resolves deferred handles on reply or
/// timeout.
pub struct Dispatcher {
    state: Arc<Mutex<SharedState>>,
    cmd_tx: mpsc::Sender<LoopCommand>,
    loop_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    timeout: Duration,
}

impl Dispatcher {
    /// Bind a ROUTER socket at `endpoint` and start the event loop.
    ///
    /// Must be called from within a Tokio runtime (the loop task is
    /// spawned onto the current executor).
    pub async fn bind(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Self::bind_with_config(endpoint, DEFAULT_REQUEST_TIMEOUT, DEFAULT_INACTIVITY_CUTOFF).await
    }

    /// Bind with an explicit request timeout and worker inactivity cutoff.
    pub async fn bind_with_config(
        endpoint: impl Into<String>,
        request_timeout: Duration,
        inactivity_cutoff: Duration,
    ) -> anyhow::Result<Self> {
        let state = Arc::new(Mutex::new(SharedState::new(inactivity_cutoff)));
        let (cmd_tx, handle) = event_loop::spawn(endpoint.into(), state.clone())?;
        Ok(Self {
            state,
            cmd_tx,
            loop_handle: Mutex::new(Some(handle)),
            timeout: request_timeout,
        })
    }

    /// Submit a request for round-robin dispatch to the fleet.
    ///
    /// Fails synchronously with [`SubmitError::NoWorkers`] if the fleet is
    /// empty, or [`SubmitError::DuplicateId`] if `correlation_id` is
    /// already pending. On success, returns a deferred handle that
    /// resolves to the worker's reply, a [`ReplyError::Timeout`] if the
    /// deadline elapses first, or a [`ReplyError::Shutdown`] if the
    /// dispatcher is torn down while the request is in flight.
    pub async fn submit(
        &self,
        correlation_id: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> Result<Deferred, SubmitError> {
        let correlation_id = correlation_id.into();
        let payload = payload.into();

        let (recipient, deferred) = {
            let mut guard = self.state.lock().await;
            if guard.pending.contains(&correlation_id) {
                return Err(SubmitError::from(DuplicateId));
            }
            let recipient = guard.fleet.pick_next().map_err(SubmitError::from)?;
            let deferred = guard
                .pending
                .insert(correlation_id.clone(), payload.clone(), recipient.clone(), self.timeout)
                .map_err(SubmitError::from)?;
            (recipient, deferred)
        };

        let mut frames = vec![recipient];
        frames.extend(relaymq_proto::encode_request(correlation_id, payload));
        // The loop task owns the socket; a closed channel only happens
        // during/after shutdown, in which case the pending entry this
        // call just registered will be drained with SHUTDOWN shortly.
        let _ = self.cmd_tx.send(LoopCommand::SendRequest { frames }).await;

        Ok(deferred)
    }

    /// Snapshot of the current fleet size.
    pub async fn active_worker_count(&self) -> usize {
        self.state.lock().await.fleet.len()
    }

    /// Stop the event loop, join it, and fail every outstanding pending
    /// request with `SHUTDOWN`.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(LoopCommand::Shutdown).await;
        if let Some(handle) = self.loop_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}
