//! Conversion logic between DTOs and domain entities.

use crate::domain::{
    ChatId, MessageContent, MessageDraft, MessageId, MessagePush, OutboundPush, ReadAck,
    ReadReceipt, UserId, ValidationError,
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain
// ========================================

/// Blank ids are treated as absent.
fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

impl TryFrom<dto::MessageForm> for MessageDraft {
    type Error = ValidationError;

    fn try_from(form: dto::MessageForm) -> Result<Self, Self::Error> {
        let chat_id = non_blank(form.chat_id)
            .map(|raw| ChatId::parse("chat_id", &raw))
            .transpose()?;
        let receiver_id = non_blank(form.receiver_id)
            .map(|raw| UserId::parse("receiver_id", &raw))
            .transpose()?;
        let content = MessageContent::new(form.text, form.attachment_urls)?;

        MessageDraft::new(chat_id, receiver_id, content)
    }
}

impl TryFrom<dto::MessageReadForm> for ReadAck {
    type Error = ValidationError;

    fn try_from(form: dto::MessageReadForm) -> Result<Self, Self::Error> {
        let message_id = non_blank(form.message_id)
            .ok_or(ValidationError::MissingField("message_id"))?;
        let chat_id = non_blank(form.chat_id).ok_or(ValidationError::MissingField("chat_id"))?;

        Ok(Self {
            message_id: MessageId::parse("message_id", &message_id)?,
            chat_id: ChatId::parse("chat_id", &chat_id)?,
        })
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<MessagePush> for dto::MessagePayload {
    fn from(push: MessagePush) -> Self {
        Self {
            id: push.id.to_string(),
            chat_id: push.chat_id.to_string(),
            sender: dto::SenderInfo {
                id: push.sender.user_id.to_string(),
                username: push.sender.username,
                avatar_url: push.sender.avatar_url,
            },
            receiver_id: push.receiver_id.map(|id| id.to_string()),
            text: push.content.text().to_string(),
            attachment_urls: push.content.attachment_urls().to_vec(),
            created_at: push.created_at.to_rfc3339(),
        }
    }
}

impl From<ReadReceipt> for dto::ReadReceiptPayload {
    fn from(receipt: ReadReceipt) -> Self {
        Self {
            message_id: receipt.message_id.to_string(),
            chat_id: receipt.chat_id.to_string(),
            sender_id: receipt.sender_id.to_string(),
            timestamp: receipt.timestamp.to_rfc3339(),
        }
    }
}

/// Render a push as its JSON wire frame.
pub fn encode_push(push: OutboundPush) -> Result<String, serde_json::Error> {
    match push {
        OutboundPush::Message(message) => serde_json::to_string(&dto::OutboundEnvelope {
            r#type: dto::PushType::Message,
            payload: dto::MessagePayload::from(message),
        }),
        OutboundPush::MessageRead(receipt) => serde_json::to_string(&dto::OutboundEnvelope {
            r#type: dto::PushType::MessageRead,
            payload: dto::ReadReceiptPayload::from(receipt),
        }),
    }
}

/// Render an error frame.
pub fn encode_error(error_code: String) -> Result<String, serde_json::Error> {
    serde_json::to_string(&dto::ErrorFrame { error_code })
}
