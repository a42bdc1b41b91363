//! Centralized ZMQ socket construction for relaymq's ROUTER/DEALER pair.
//!
//! Every socket in the crate is built through these helpers so option
//! tuning (linger, reconnect backoff) lives in one place.
//!
//! `tmq` doesn't export its socket types directly, so stored sockets use
//! the trait bounds below rather than naming the concrete type.

use anyhow::{Context, Result};
use futures::{Sink, Stream};
use tmq::{dealer, router, TmqError};

pub use tmq::Context as ZmqContext;
pub use tmq::Multipart;

/// Reconnect interval in milliseconds, applied to both socket ends.
pub const DEFAULT_RECONNECT_IVL_MS: i32 = 1000;

/// Cap on exponential reconnect backoff, in milliseconds.
pub const DEFAULT_RECONNECT_IVL_MAX_MS: i32 = 60_000;

/// Trait bound for DEALER sockets (worker side: send and receive).
pub trait DealerSocket:
    Stream<Item = Result<Multipart, TmqError>> + Sink<Multipart, Error = TmqError> + Unpin + Send
{
}
impl<T> DealerSocket for T where
    T: Stream<Item = Result<Multipart, TmqError>> + Sink<Multipart, Error = TmqError> + Unpin + Send
{
}

/// Trait bound for ROUTER sockets (dispatcher side: send and receive with identities).
pub trait RouterSocket:
    Stream<Item = Result<Multipart, TmqError>> + Sink<Multipart, Error = TmqError> + Unpin + Send
{
}
impl<T> RouterSocket for T where
    T: Stream<Item = Result<Multipart, TmqError>> + Sink<Multipart, Error = TmqError> + Unpin + Send
{
}

/// Build a DEALER socket with a pre-set routing identity and connect it to
/// the dispatcher's bind endpoint.
///
/// Connect is non-blocking: the dispatcher doesn't need to exist yet, and
/// ZMQ reconnects automatically if it disappears and comes back.
pub fn create_dealer_and_connect(
    ctx: &ZmqContext,
    endpoint: &str,
    identity: &[u8],
) -> Result<impl DealerSocket> {
    dealer(ctx)
        .set_linger(0)
        .set_reconnect_ivl(DEFAULT_RECONNECT_IVL_MS)
        .set_reconnect_ivl_max(DEFAULT_RECONNECT_IVL_MAX_MS)
        .set_identity(identity)
        .connect(endpoint)
        .with_context(|| format!("failed to connect DEALER to {endpoint}"))
}

/// Build a ROUTER socket and bind it to the dispatcher's endpoint.
pub fn create_router_and_bind(ctx: &ZmqContext, endpoint: &str) -> Result<impl RouterSocket> {
    router(ctx)
        .set_linger(0)
        .set_reconnect_ivl(DEFAULT_RECONNECT_IVL_MS)
        .set_reconnect_ivl_max(DEFAULT_RECONNECT_IVL_MAX_MS)
        .bind(endpoint)
        .with_context(|| format!("failed to bind ROUTER to {endpoint}"))
}
