//! Pending-request table: correlation id -> (payload, deadline, completion sink).
//!
//! Grounded on the teacher's `HootClient` reactor (`hooteproto::client`),
//! which keys a `HashMap<Uuid, PendingRequest>` by request id and resolves
//! each via a stored `oneshot::Sender` on reply or on a deadline sweep -
//! generalized here to the dispatcher side, where recipient binding (spec
//! §9, resolved option (a)) lets a BYE fail in-flight requests early
//! instead of waiting out the full timeout.

use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

use crate::fleet::WorkerIdentity;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Why a pending request failed instead of completing with a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("no reply arrived before the request deadline")]
    Timeout,
    #[error("the dispatcher was shut down while this request was pending")]
    Shutdown,
}

/// Outcome of a submitted request, delivered through the deferred handle.
pub type ReplyResult = Result<Bytes, ReplyError>;

/// The dispatcher-side half of the single-use completion channel. Consumed
/// by exactly one of: a matching reply, a deadline sweep, or shutdown
/// drain (spec invariant P2).
type CompletionSink = oneshot::Sender<ReplyResult>;

/// The caller-side half, returned from `submit`.
pub type Deferred = oneshot::Receiver<ReplyResult>;

struct PendingRequest {
    #[allow(dead_code)]
    payload: Bytes,
    submitted_at: Instant,
    deadline_at: Instant,
    recipient: WorkerIdentity,
    sink: CompletionSink,
}

/// Submit rejected synchronously: `correlation_id` already has an entry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("correlation id is already pending")]
pub struct DuplicateId;

/// Keyed by correlation id. Owned exclusively by the dispatcher loop.
#[derive(Default)]
pub struct PendingTable {
    entries: HashMap<Bytes, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request bound to the worker it was routed
    /// to. Rejects on correlation id collision (invariant P1).
    pub fn insert(
        &mut self,
        correlation_id: Bytes,
        payload: Bytes,
        recipient: WorkerIdentity,
        timeout: Duration,
    ) -> Result<Deferred, DuplicateId> {
        if self.entries.contains_key(&correlation_id) {
            return Err(DuplicateId);
        }
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        self.entries.insert(
            correlation_id,
            PendingRequest {
                payload,
                submitted_at: now,
                deadline_at: now + timeout,
                recipient,
                sink: tx,
            },
        );
        Ok(rx)
    }

    /// Fulfil the sink for `correlation_id` with a reply payload. If the
    /// id isn't present (the request already timed out, or the id was
    /// spoofed), the reply is dropped - this is not surfaced as an error,
    /// per spec §7 MALFORMED_FRAME-adjacent policy for orphan replies.
    pub fn complete(&mut self, correlation_id: &Bytes, payload: Bytes) {
        if let Some(entry) = self.entries.remove(correlation_id) {
            let _ = entry.sink.send(Ok(payload));
        } else {
            debug!("dropping reply for unknown or already-resolved correlation id");
        }
    }

    /// Fail every entry whose deadline has passed with `TIMEOUT`, removing
    /// them from the table.
    pub fn sweep_deadlines(&mut self, now: Instant) -> usize {
        let expired: Vec<Bytes> = self
            .entries
            .iter()
            .filter(|(_, req)| req.deadline_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(entry) = self.entries.remove(id) {
                let _ = entry.sink.send(Err(ReplyError::Timeout));
            }
        }
        expired.len()
    }

    /// Fail every pending entry whose recipient is `identity` with
    /// `TIMEOUT`. Called when a BYE arrives for that worker, so in-flight
    /// requests don't wait out the full deadline for a worker that has
    /// already announced it is gone (spec §9, option (a)).
    pub fn fail_recipient(&mut self, identity: &WorkerIdentity) -> usize {
        let bound: Vec<Bytes> = self
            .entries
            .iter()
            .filter(|(_, req)| &req.recipient == identity)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &bound {
            if let Some(entry) = self.entries.remove(id) {
                let _ = entry.sink.send(Err(ReplyError::Timeout));
            }
        }
        bound.len()
    }

    /// Fulfil every remaining sink with `SHUTDOWN`. Called once, when the
    /// dispatcher is destroyed.
    pub fn drain_on_shutdown(&mut self) {
        for (_, entry) in self.entries.drain() {
            let _ = entry.sink.send(Err(ReplyError::Shutdown));
        }
    }

    pub fn contains(&self, correlation_id: &Bytes) -> bool {
        self.entries.contains_key(correlation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn submitted_at(&self, correlation_id: &Bytes) -> Option<Instant> {
        self.entries.get(correlation_id).map(|e| e.submitted_at)
    }
}
