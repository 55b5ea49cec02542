//! Error types for Meridian

use thiserror::Error;

use crate::identity::NodeId;
use crate::wire::MessageKind;

/// Top-level error type for Meridian
#[derive(Debug, Error)]
pub enum MeridianError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Forwarding error: {0}")]
    Forward(#[from] ForwardError),
}

/// Errors decoding a wire message
///
/// All of these are local: the packet is dropped and nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Empty buffer")]
    Empty,

    #[error("Unknown message type: {0}")]
    UnknownType(u8),

    #[error("Truncated {kind} message: need {expected} bytes, have {actual}")]
    Truncated {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    #[error("Unexpected {0} message")]
    UnexpectedKind(MessageKind),
}

/// Errors reported by a transport collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Next hop unreachable: {0}")]
    Unreachable(NodeId),
}

/// Reasons the forwarding layer gives up on a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("No neighbor makes progress and no recovery neighbor exists")]
    NoRoute,

    #[error("Location search timed out")]
    SearchTimeout,

    #[error("Deferred queue overflow")]
    QueueOverflow,

    #[error("Buffered too long")]
    QueueExpired,

    #[error("TTL expired")]
    TtlExpired,
}
