//! Directory error types

use meridian_core::{DecodeError, MeridianError, MessageKind, Role};
use thiserror::Error;

/// Errors handling a location directory message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The payload did not decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A forwarding-layer message arrived on the directory port
    #[error("{kind} message is not handled by the {role} directory")]
    UnexpectedMessage { role: Role, kind: MessageKind },
}

impl From<DirectoryError> for MeridianError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Decode(e) => MeridianError::Decode(e),
            DirectoryError::UnexpectedMessage { kind, .. } => {
                MeridianError::Decode(DecodeError::UnexpectedKind(kind))
            }
        }
    }
}

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;
