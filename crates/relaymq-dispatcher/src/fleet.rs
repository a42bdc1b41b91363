//! Fleet registry: the set of workers the dispatcher currently believes are
//! live, their last-seen timestamps, and a round-robin selection cursor.
//!
//! Grounded on the teacher's `ClientTracker` (liveness bookkeeping) and the
//! C++ original's `ServerImpl` round-robin deque, generalized to keep
//! admission order explicit (spec invariants F1-F3) rather than relying on
//! a hash map's iteration order.

use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An opaque, stable routing identity assigned by a worker at startup.
pub type WorkerIdentity = Bytes;

/// Default inactivity cutoff: a silent worker is evicted after this long.
pub const DEFAULT_INACTIVITY_CUTOFF: Duration = Duration::from_secs(10);

/// The ordered set of live workers plus a round-robin cursor.
///
/// Invariants (spec §3):
/// - F1: every identity in `order` has an entry in `last_seen`, and vice versa.
/// - F2: no duplicates in `order`.
/// - F3: `pick_next` on an empty fleet fails rather than panicking.
#[derive(Debug)]
pub struct Fleet {
    order: Vec<WorkerIdentity>,
    last_seen: HashMap<WorkerIdentity, Instant>,
    cursor: u64,
    cutoff: Duration,
}

/// Fleet is empty; `submit` (or any other fleet-consuming operation) cannot proceed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no workers are currently registered")]
pub struct NoWorkers;

impl Fleet {
    pub fn new() -> Self {
        Self::with_cutoff(DEFAULT_INACTIVITY_CUTOFF)
    }

    pub fn with_cutoff(cutoff: Duration) -> Self {
        Self {
            order: Vec::new(),
            last_seen: HashMap::new(),
            cursor: 0,
            cutoff,
        }
    }

    /// Admit a worker (HELLO). Idempotent: a repeat HELLO from an already
    /// known identity just refreshes last-seen and leaves fleet size and
    /// position unchanged.
    pub fn admit(&mut self, identity: WorkerIdentity) {
        if !self.last_seen.contains_key(&identity) {
            self.order.push(identity.clone());
            info!(worker = %hex_preview(&identity), "worker admitted");
        } else {
            debug!(worker = %hex_preview(&identity), "duplicate HELLO, refreshing");
        }
        self.last_seen.insert(identity, Instant::now());
    }

    /// Refresh last-seen (PING, or a reply proving the worker is alive).
    /// Defensive per spec §4.C: if the identity isn't registered (e.g. the
    /// HELLO was dropped or arrived after a reply), admit it now.
    pub fn touch(&mut self, identity: WorkerIdentity) {
        if !self.last_seen.contains_key(&identity) {
            self.admit(identity);
            return;
        }
        self.last_seen.insert(identity, Instant::now());
    }

    /// Remove a worker (BYE, or swept for inactivity). Preserves the
    /// relative order of the remaining entries; the cursor is left alone
    /// since `pick_next` takes it modulo the new length, so it can never
    /// address a hole.
    pub fn remove(&mut self, identity: &WorkerIdentity) -> bool {
        let before = self.order.len();
        self.order.retain(|id| id != identity);
        let removed = self.order.len() != before;
        if removed {
            self.last_seen.remove(identity);
            info!(worker = %hex_preview(identity), "worker removed");
        }
        removed
    }

    /// Select the next worker in round-robin order.
    pub fn pick_next(&mut self) -> Result<WorkerIdentity, NoWorkers> {
        if self.order.is_empty() {
            return Err(NoWorkers);
        }
        let idx = (self.cursor % self.order.len() as u64) as usize;
        self.cursor = self.cursor.wrapping_add(1);
        Ok(self.order[idx].clone())
    }

    /// Evict every worker whose last-seen is older than the configured
    /// cutoff. Returns the identities removed, for the caller to fail any
    /// pending requests bound to them.
    pub fn sweep(&mut self, now: Instant) -> Vec<WorkerIdentity> {
        let stale: Vec<WorkerIdentity> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > self.cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for identity in &stale {
            warn!(worker = %hex_preview(identity), "worker swept for inactivity");
            self.remove(identity);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, identity: &WorkerIdentity) -> bool {
        self.last_seen.contains_key(identity)
    }
}

impl Default for Fleet {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_preview(identity: &WorkerIdentity) -> String {
    if identity.len() <= 8 {
        hex_encode(identity)
    } else {
        format!("{}...", hex_encode(&identity[..8]))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
