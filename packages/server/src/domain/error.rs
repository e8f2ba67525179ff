//! Domain errors.

use thiserror::Error;

use super::value_object::{ChatId, MessageId};

/// Validation failures on inbound command input. No side effects have been
/// performed when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field}: '{value}'")]
    InvalidId { field: &'static str, value: String },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("either chat_id or receiver_id is required")]
    MissingTarget,

    #[error("message must contain text or at least one attachment")]
    EmptyMessage,

    #[error("message text exceeds {max} characters (got {actual})")]
    TextTooLong { max: usize, actual: usize },

    #[error("message carries {actual} attachments, at most {max} allowed")]
    TooManyAttachments { max: usize, actual: usize },

    #[error("attachment url must not be empty")]
    EmptyAttachmentUrl,

    #[error("cannot start a private chat with yourself")]
    SelfMessage,

    #[error("message {message_id} does not belong to chat {chat_id}")]
    ChatMismatch {
        message_id: MessageId,
        chat_id: ChatId,
    },
}

/// Failures reported by the persistence / lookup collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}
