//! relaymq-worker - the worker half of the relaymq RPC system.
//!
//! Connects a DEALER socket to a dispatcher's ROUTER endpoint, announces
//! itself with HELLO, serves requests through a user-supplied handler, and
//! keeps itself alive in the fleet with idle PING heartbeats (spec §4.B).

mod session;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use relaymq_proto::socket_config::{create_dealer_and_connect, ZmqContext};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use session::{Handler, HANDLER_FAULT_PREFIX};

/// Default idle threshold before a heartbeat PING is sent (spec §4.B).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// A connected worker session. Dropping this without calling [`Worker::unbind`]
/// still signals the session task to say goodbye before exiting, but does not
/// wait for it - call `unbind` if the caller needs that to have happened
/// before moving on.
pub struct Worker {
    identity: Bytes,
    handler: Arc<RwLock<Option<Handler>>>,
    cmd_tx: mpsc::Sender<session::Command>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Connect to `endpoint` with a freshly generated identity and the
    /// default heartbeat interval.
    pub async fn connect(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        Self::connect_with_heartbeat(endpoint, DEFAULT_HEARTBEAT_INTERVAL).await
    }

    /// Connect with an explicit heartbeat interval.
    pub async fn connect_with_heartbeat(
        endpoint: impl Into<String>,
        heartbeat_interval: Duration,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.into();
        let identity = Bytes::from(Uuid::new_v4().to_string());

        let ctx = ZmqContext::new();
        let socket = create_dealer_and_connect(&ctx, &endpoint, &identity)
            .with_context(|| format!("failed to connect worker to {endpoint}"))?;

        let handler: Arc<RwLock<Option<Handler>>> = Arc::new(RwLock::new(None));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let task = tokio::spawn(session::run(
            ctx,
            socket,
            identity.clone(),
            heartbeat_interval,
            handler.clone(),
            cmd_rx,
        ));

        Ok(Self {
            identity,
            handler,
            cmd_tx,
            task: tokio::sync::Mutex::new(Some(task)),
        })
    }

    /// The generated worker identity (a UUIDv4, rendered as text).
    pub fn identity(&self) -> &Bytes {
        &self.identity
    }

    /// Register (or replace) the request handler. Safe to call before or
    /// after requests start arriving; a request that lands with no handler
    /// registered yet replies with [`HANDLER_FAULT_PREFIX`].
    pub fn set_request_handler(&self, handler: impl Fn(Bytes) -> Bytes + Send + Sync + 'static) {
        *self.handler.write().expect("handler lock poisoned") = Some(Arc::new(handler));
    }

    /// Send BYE and stop serving. Waits for the session task to finish
    /// emitting it before returning.
    pub async fn unbind(&self) {
        let _ = self.cmd_tx.send(session::Command::Shutdown).await;
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Best-effort: ask the session to say goodbye. Can't await here, so
        // callers that need the BYE to have landed before returning should
        // call `unbind` explicitly.
        let _ = self.cmd_tx.try_send(session::Command::Shutdown);
    }
}
