//! UseCase layer errors.

use thiserror::Error;

use crate::domain::{ServiceError, ValidationError};

use super::command_router::CommandKind;

/// Recoverable per-frame failure. Its `Display` string is sent back to the
/// originating connection as the error frame's `error_code`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("no handler for command: {0}")]
    NoHandler(String),

    #[error("invalid payload for command {kind}: {reason}")]
    InvalidPayload { kind: CommandKind, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Startup-time registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("a handler for command '{0}' is already registered")]
    DuplicateHandler(CommandKind),
}
