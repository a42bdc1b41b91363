//! relaymq-proto - wire framing and socket construction for the relaymq
//! ROUTER/DEALER RPC broker.
//!
//! This crate owns the parts of the system described in spec §4.A and §6:
//! the RMQ01 frame codec (always available) and the `tmq`/`zmq` socket
//! helpers (behind the `peer` feature, since not every consumer of the
//! wire types needs a ZMQ context - e.g. a future pure-decoding tool).

pub mod frame;

#[cfg(feature = "peer")]
pub mod socket_config;

pub use frame::{
    decode_inbound, decode_request, encode_control, encode_reply, encode_request, BodyGroup,
    ControlKind, ControlPacket, FrameError, InboundGroup, MAX_ID_LEN,
};
