//! Collaborator traits
//!
//! メッセージ・チャット・プロフィールの永続化は外部サービスの責務です。
//! ドメイン層が必要とするインターフェースをここで定義し、具体的な実装は
//! Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::{Message, PublicProfile},
    error::ServiceError,
    value_object::{ChatId, MessageId, Timestamp, UserId},
};

/// Message persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Persist a message and return the chat it belongs to.
    ///
    /// When the message carries only a `receiver_id`, the implementation resolves
    /// (or lazily creates) the private chat between sender and receiver.
    async fn save_message(&self, message: &Message) -> Result<ChatId, ServiceError>;

    async fn get_message_by_id(&self, message_id: &MessageId) -> Result<Message, ServiceError>;

    /// Move `user_id`'s last-read marker in `chat_id` to `timestamp`.
    async fn update_last_read_ts(
        &self,
        timestamp: Timestamp,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<(), ServiceError>;
}

/// Chat membership lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn get_chat_participants(&self, chat_id: &ChatId) -> Result<Vec<UserId>, ServiceError>;
}

/// Public profile lookup and presence bookkeeping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn get_public_user_info(&self, user_id: &UserId) -> Result<PublicProfile, ServiceError>;

    /// Record that `user_id` was last seen now.
    async fn update_last_seen(&self, user_id: &UserId) -> Result<(), ServiceError>;
}
