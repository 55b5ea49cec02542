//! Routing error types
//!
//! Re-exports the core forwarding errors and adds the failures that can
//! occur while handling one inbound frame.

use thiserror::Error;

use meridian_core::{DecodeError, TransportError};
use meridian_location::DirectoryError;

pub use meridian_core::ForwardError;

/// Errors handling a frame or a packet at one node
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The packet was given up on
    #[error("Forwarding error: {0}")]
    Forward(#[from] ForwardError),

    /// The frame did not decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The link layer refused the frame
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A directory payload could not be handled
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
