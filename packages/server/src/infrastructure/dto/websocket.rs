//! WebSocket frame DTOs.
//!
//! Every frame in both directions is an envelope `{"type": ..., "payload": ...}`.
//! Recoverable failures are reported as `{"error_code": ...}`.

use serde::{Deserialize, Serialize};

/// Outer envelope of an inbound frame. The payload stays opaque until the
/// command router decodes it for the matching handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub r#type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Discriminator of outbound pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushType {
    Message,
    MessageRead,
}

/// Outer envelope of an outbound push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope<T> {
    pub r#type: PushType,
    pub payload: T,
}

/// Payload of the inbound "message" command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageForm {
    pub chat_id: Option<String>,
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachment_urls: Vec<String>,
}

/// Payload of the inbound "message_read" command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReadForm {
    pub message_id: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Payload of the outbound "message" push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub chat_id: String,
    pub sender: SenderInfo,
    pub receiver_id: Option<String>,
    pub text: String,
    pub attachment_urls: Vec<String>,
    /// RFC 3339
    pub created_at: String,
}

/// Payload of the outbound "message_read" push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptPayload {
    pub message_id: String,
    pub chat_id: String,
    /// The user who read the message.
    pub sender_id: String,
    /// RFC 3339
    pub timestamp: String,
}

/// Error frame sent back on recoverable per-frame failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error_code: String,
}
