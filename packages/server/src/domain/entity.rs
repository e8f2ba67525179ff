//! Domain entities
//!
//! - `Message`: チャットメッセージ（永続化は外部の MessageService が担う）
//! - `ReadReceipt`: 既読通知（送信者にのみ届く）
//! - `OutboundPush`: 接続中のクライアントへ送るプッシュ

use super::{
    error::ValidationError,
    value_object::{ChatId, MessageId, Timestamp, UserId},
};

/// Maximum number of characters in a message text (after trimming).
pub const MAX_TEXT_LENGTH: usize = 4096;

/// Maximum number of attachments per message.
pub const MAX_ATTACHMENTS: usize = 10;

/// Validated message body: text and attachment URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContent {
    text: String,
    attachment_urls: Vec<String>,
}

impl MessageContent {
    /// # Errors
    ///
    /// Fails if both text and attachments are empty, if the text is longer than
    /// [`MAX_TEXT_LENGTH`], or if there are too many / blank attachment URLs.
    pub fn new(text: String, attachment_urls: Vec<String>) -> Result<Self, ValidationError> {
        let text = text.trim().to_string();
        let length = text.chars().count();
        if length > MAX_TEXT_LENGTH {
            return Err(ValidationError::TextTooLong {
                max: MAX_TEXT_LENGTH,
                actual: length,
            });
        }
        if attachment_urls.len() > MAX_ATTACHMENTS {
            return Err(ValidationError::TooManyAttachments {
                max: MAX_ATTACHMENTS,
                actual: attachment_urls.len(),
            });
        }
        if attachment_urls.iter().any(|url| url.trim().is_empty()) {
            return Err(ValidationError::EmptyAttachmentUrl);
        }
        if text.is_empty() && attachment_urls.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        Ok(Self {
            text,
            attachment_urls,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachment_urls(&self) -> &[String] {
        &self.attachment_urls
    }
}

/// A message as submitted by a client, before the server assigns identity and time.
///
/// At least one of `chat_id` / `receiver_id` is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    chat_id: Option<ChatId>,
    receiver_id: Option<UserId>,
    content: MessageContent,
}

impl MessageDraft {
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingTarget`] if neither a chat nor a receiver is given.
    pub fn new(
        chat_id: Option<ChatId>,
        receiver_id: Option<UserId>,
        content: MessageContent,
    ) -> Result<Self, ValidationError> {
        if chat_id.is_none() && receiver_id.is_none() {
            return Err(ValidationError::MissingTarget);
        }
        Ok(Self {
            chat_id,
            receiver_id,
            content,
        })
    }
}

/// Chat message entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    /// `None` only before persistence when the message bootstraps a private chat.
    pub chat_id: Option<ChatId>,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl Message {
    /// Build a message from a client draft.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SelfMessage`] if the sender addresses themselves.
    pub fn compose(
        id: MessageId,
        sender_id: UserId,
        draft: MessageDraft,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        if draft.receiver_id == Some(sender_id) {
            return Err(ValidationError::SelfMessage);
        }
        Ok(Self {
            id,
            chat_id: draft.chat_id,
            sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            created_at,
        })
    }
}

/// A client acknowledging that it has read up to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAck {
    pub message_id: MessageId,
    pub chat_id: ChatId,
}

/// Display metadata of a user, attached to message pushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicProfile {
    pub user_id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Read receipt delivered to the original sender of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    /// The user who read the message.
    pub sender_id: UserId,
    /// `created_at` of the acknowledged message; the reader's new last-read marker.
    pub timestamp: Timestamp,
}

/// A persisted message rendered for fan-out, with its resolved chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePush {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: PublicProfile,
    pub receiver_id: Option<UserId>,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl MessagePush {
    pub fn new(message: Message, chat_id: ChatId, sender: PublicProfile) -> Self {
        Self {
            id: message.id,
            chat_id,
            sender,
            receiver_id: message.receiver_id,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

/// Event pushed to live connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPush {
    Message(MessagePush),
    MessageRead(ReadReceipt),
}

impl OutboundPush {
    /// Wire discriminator of the push.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::MessageRead(_) => "message_read",
        }
    }
}
