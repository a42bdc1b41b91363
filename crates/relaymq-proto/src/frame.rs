//! RMQ01 frame codec.
//!
//! ## Wire shapes
//!
//! Three message classes travel over the ROUTER/DEALER pair, all as ZMQ
//! multipart groups:
//!
//! ```text
//! Control (worker -> dispatcher):
//!   [routing-identity]  (injected by the ROUTER socket, stripped before decode)
//!   [empty delimiter]
//!   [kind byte]          1 = HELLO, 2 = PING, 3 = BYE
//!   [worker identity]
//!
//! Request (dispatcher -> worker):
//!   [routing-identity]  (consumed by DEALER, not present on the wire out)
//!   [empty delimiter]
//!   [correlation id]
//!   [payload]
//!
//! Reply (worker -> dispatcher):
//!   [routing-identity]  (injected by the ROUTER socket, stripped before decode)
//!   [empty delimiter]
//!   [correlation id]
//!   [result]
//! ```
//!
//! A group is classified by its first content frame (after identity +
//! delimiter are stripped): if it is exactly one byte and that byte is a
//! known [`ControlKind`], the group is control traffic; otherwise it is a
//! reply keyed by the first frame. This is unambiguous regardless of what
//! a correlation id happens to contain, unlike an ASCII-tag scheme sharing
//! the same frame position.

use bytes::Bytes;
use thiserror::Error;

/// Maximum length, in bytes, of an identity or correlation id frame.
pub const MAX_ID_LEN: usize = 255;

/// Kind byte for control packets (worker -> dispatcher only).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Hello = 1,
    Ping = 2,
    Bye = 3,
}

impl ControlKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ControlKind::Hello),
            2 => Some(ControlKind::Ping),
            3 => Some(ControlKind::Bye),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// A worker-originated control packet: HELLO / PING / BYE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPacket {
    pub kind: ControlKind,
    pub identity: Bytes,
}

impl ControlPacket {
    pub fn new(kind: ControlKind, identity: impl Into<Bytes>) -> Self {
        Self {
            kind,
            identity: identity.into(),
        }
    }

    pub fn hello(identity: impl Into<Bytes>) -> Self {
        Self::new(ControlKind::Hello, identity)
    }

    pub fn ping(identity: impl Into<Bytes>) -> Self {
        Self::new(ControlKind::Ping, identity)
    }

    pub fn bye(identity: impl Into<Bytes>) -> Self {
        Self::new(ControlKind::Bye, identity)
    }

    /// Encode to the two content frames (delimiter is the caller's concern,
    /// since only the dispatcher-bound path needs one).
    pub fn to_frames(&self) -> [Bytes; 2] {
        [Bytes::copy_from_slice(&[self.kind.to_u8()]), self.identity.clone()]
    }
}

/// A request or reply body group: [correlation_id, payload].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyGroup {
    pub correlation_id: Bytes,
    pub payload: Bytes,
}

impl BodyGroup {
    pub fn new(correlation_id: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            payload: payload.into(),
        }
    }

    pub fn to_frames(&self) -> [Bytes; 2] {
        [self.correlation_id.clone(), self.payload.clone()]
    }
}

/// The decoded shape of an inbound worker->dispatcher group, after the
/// routing identity and empty delimiter have been stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundGroup {
    Control(ControlPacket),
    Reply(BodyGroup),
}

/// Errors produced while decoding a wire group. Per spec (4.A), a malformed
/// group is logged and dropped by the caller; it never tears down the
/// socket. This type exists so the caller has something to log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("expected a non-empty delimiter frame")]
    MissingDelimiter,
    #[error("expected exactly {expected} content frames after the delimiter, got {actual}")]
    WrongFrameCount { expected: usize, actual: usize },
    #[error("zero-length content frame where a kind byte or id was expected")]
    EmptyFrame,
    #[error("undefined control kind byte {0:#04x}")]
    UndefinedKind(u8),
    #[error("identity or correlation id exceeds {MAX_ID_LEN} bytes (got {0})")]
    IdTooLong(usize),
}

/// Decode the content frames of a worker->dispatcher group (everything
/// after the ROUTER-injected routing identity has already been stripped
/// by the caller).
///
/// `frames` must be exactly `[delimiter, content_0, content_1]`. The
/// delimiter itself is not validated beyond being present and empty,
/// mirroring the wire contract: ZMQ REQ/ROUTER conventions use an empty
/// frame as a stack-popping marker, not as meaningful content.
pub fn decode_inbound(frames: &[Bytes]) -> Result<InboundGroup, FrameError> {
    if frames.len() != 3 {
        return Err(FrameError::WrongFrameCount {
            expected: 3,
            actual: frames.len(),
        });
    }
    if !frames[0].is_empty() {
        return Err(FrameError::MissingDelimiter);
    }

    let first = &frames[1];
    let second = &frames[2];

    if first.is_empty() {
        return Err(FrameError::EmptyFrame);
    }

    if first.len() == 1 {
        if let Some(kind) = ControlKind::from_u8(first[0]) {
            if second.len() > MAX_ID_LEN {
                return Err(FrameError::IdTooLong(second.len()));
            }
            return Ok(InboundGroup::Control(ControlPacket::new(kind, second.clone())));
        }
        return Err(FrameError::UndefinedKind(first[0]));
    }

    if first.len() > MAX_ID_LEN {
        return Err(FrameError::IdTooLong(first.len()));
    }
    Ok(InboundGroup::Reply(BodyGroup::new(first.clone(), second.clone())))
}

/// Encode a dispatcher->worker request group: `[delimiter, correlation_id, payload]`,
/// to be prefixed with the chosen worker's routing identity by the caller.
pub fn encode_request(correlation_id: impl Into<Bytes>, payload: impl Into<Bytes>) -> Vec<Bytes> {
    vec![Bytes::new(), correlation_id.into(), payload.into()]
}

/// Decode a dispatcher->worker request group on the worker's side:
/// `[delimiter, correlation_id, payload]`.
///
/// Unlike [`decode_inbound`], this never routes through the control-kind
/// check: a worker only ever receives request groups on this socket, never
/// HELLO/PING/BYE (those are worker-originated), so a one-byte correlation
/// id that happens to equal a kind byte must still decode as a request
/// rather than being misclassified as control traffic and dropped.
pub fn decode_request(frames: &[Bytes]) -> Result<BodyGroup, FrameError> {
    if frames.len() != 3 {
        return Err(FrameError::WrongFrameCount {
            expected: 3,
            actual: frames.len(),
        });
    }
    if !frames[0].is_empty() {
        return Err(FrameError::MissingDelimiter);
    }

    let correlation_id = &frames[1];
    if correlation_id.is_empty() {
        return Err(FrameError::EmptyFrame);
    }
    if correlation_id.len() > MAX_ID_LEN {
        return Err(FrameError::IdTooLong(correlation_id.len()));
    }

    Ok(BodyGroup::new(correlation_id.clone(), frames[2].clone()))
}

/// Encode a worker->dispatcher reply group: `[delimiter, correlation_id, result]`.
pub fn encode_reply(correlation_id: impl Into<Bytes>, result: impl Into<Bytes>) -> Vec<Bytes> {
    vec![Bytes::new(), correlation_id.into(), result.into()]
}

/// Encode a worker->dispatcher control group: `[delimiter, kind byte, identity]`.
pub fn encode_control(packet: &ControlPacket) -> Vec<Bytes> {
    let [kind, identity] = packet.to_frames();
    vec![Bytes::new(), kind, identity]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hello_roundtrip() {
        let packet = ControlPacket::hello(Bytes::from_static(b"worker-1"));
        let wire = encode_control(&packet);
        let decoded = decode_inbound(&wire).unwrap();
        assert_eq!(decoded, InboundGroup::Control(packet));
    }

    #[test]
    fn ping_roundtrip() {
        let packet = ControlPacket::ping(Bytes::from_static(b"worker-2"));
        let wire = encode_control(&packet);
        assert_eq!(decode_inbound(&wire).unwrap(), InboundGroup::Control(packet));
    }

    #[test]
    fn bye_roundtrip() {
        let packet = ControlPacket::bye(Bytes::from_static(b"worker-3"));
        let wire = encode_control(&packet);
        assert_eq!(decode_inbound(&wire).unwrap(), InboundGroup::Control(packet));
    }

    #[test]
    fn reply_roundtrip() {
        let wire = encode_reply(Bytes::from_static(b"req-0"), Bytes::from_static(b"result"));
        let decoded = decode_inbound(&wire).unwrap();
        assert_eq!(
            decoded,
            InboundGroup::Reply(BodyGroup::new(
                Bytes::from_static(b"req-0"),
                Bytes::from_static(b"result")
            ))
        );
    }

    #[test]
    fn reply_with_correlation_id_equal_to_ping_text_is_not_control() {
        // This is exactly the ambiguity the one-byte-kind scheme sidesteps:
        // an ASCII-tag scheme sharing the id frame position would misparse
        // a correlation id of "PING" as a control packet.
        let wire = encode_reply(Bytes::from_static(b"PING"), Bytes::from_static(b"ok"));
        let decoded = decode_inbound(&wire).unwrap();
        assert_eq!(
            decoded,
            InboundGroup::Reply(BodyGroup::new(
                Bytes::from_static(b"PING"),
                Bytes::from_static(b"ok")
            ))
        );
    }

    #[test]
    fn missing_delimiter_is_rejected() {
        let frames = vec![
            Bytes::from_static(b"not-empty"),
            Bytes::from_static(b"req-0"),
            Bytes::from_static(b"payload"),
        ];
        assert_eq!(decode_inbound(&frames), Err(FrameError::MissingDelimiter));
    }

    #[test]
    fn wrong_frame_count_is_rejected() {
        let frames = vec![Bytes::new(), Bytes::from_static(b"only-one")];
        assert_eq!(
            decode_inbound(&frames),
            Err(FrameError::WrongFrameCount {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn undefined_kind_byte_is_rejected() {
        let frames = vec![
            Bytes::new(),
            Bytes::from_static(&[0x09]),
            Bytes::from_static(b"worker-1"),
        ];
        assert_eq!(decode_inbound(&frames), Err(FrameError::UndefinedKind(0x09)));
    }

    #[test]
    fn empty_first_content_frame_is_rejected() {
        let frames = vec![Bytes::new(), Bytes::new(), Bytes::from_static(b"x")];
        assert_eq!(decode_inbound(&frames), Err(FrameError::EmptyFrame));
    }

    #[test]
    fn oversized_identity_is_rejected() {
        let long = Bytes::from(vec![b'a'; MAX_ID_LEN + 1]);
        let frames = vec![Bytes::new(), Bytes::from_static(&[1]), long];
        assert!(matches!(
            decode_inbound(&frames),
            Err(FrameError::IdTooLong(_))
        ));
    }

    #[test]
    fn decode_request_accepts_correlation_id_equal_to_a_kind_byte() {
        // A worker only ever sees request groups on this path, never control
        // traffic, so a one-byte correlation id equal to 0x01 (HELLO's kind
        // byte) must decode as a request rather than misclassify as control.
        let wire = encode_request(Bytes::from_static(&[0x01]), Bytes::from_static(b"payload"));
        let decoded = decode_request(&wire).unwrap();
        assert_eq!(decoded.correlation_id, Bytes::from_static(&[0x01]));
        assert_eq!(decoded.payload, Bytes::from_static(b"payload"));
    }

    #[test]
    fn decode_request_rejects_missing_delimiter() {
        let frames = vec![
            Bytes::from_static(b"not-empty"),
            Bytes::from_static(b"req-0"),
            Bytes::from_static(b"payload"),
        ];
        assert_eq!(decode_request(&frames), Err(FrameError::MissingDelimiter));
    }

    #[test]
    fn control_kind_byte_values_match_wire_protocol() {
        assert_eq!(ControlKind::Hello.to_u8(), 1);
        assert_eq!(ControlKind::Ping.to_u8(), 2);
        assert_eq!(ControlKind::Bye.to_u8(), 3);
        assert_eq!(ControlKind::from_u8(1), Some(ControlKind::Hello));
        assert_eq!(ControlKind::from_u8(2), Some(ControlKind::Ping));
        assert_eq!(ControlKind::from_u8(3), Some(ControlKind::Bye));
        assert_eq!(ControlKind::from_u8(0), None);
        assert_eq!(ControlKind::from_u8(4), None);
    }
}
