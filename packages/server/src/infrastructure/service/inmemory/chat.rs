//! InMemory chat / message store
//!
//! ドメイン層が定義する `MessageService` と `ChatService` の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! receiver_id のみを指定したメッセージは、送信者と受信者のプライベートチャットを
//! 解決し、存在しなければその場で作成します。chat_id を指定したメッセージは、
//! 送信者がそのチャットの参加者である場合にのみ保存されます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChatId, ChatService, Message, MessageId, MessageService, ServiceError, Timestamp, UserId,
};

#[derive(Debug, Default)]
struct Chat {
    participants: Vec<UserId>,
    last_read: HashMap<UserId, Timestamp>,
}

#[derive(Debug, Default)]
struct Store {
    chats: HashMap<ChatId, Chat>,
    /// Sorted user pair → private chat
    private_chats: HashMap<(UserId, UserId), ChatId>,
    messages: HashMap<MessageId, Message>,
}

impl Store {
    fn private_chat(&mut self, a: UserId, b: UserId) -> ChatId {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(chat_id) = self.private_chats.get(&key) {
            return *chat_id;
        }

        let chat_id = ChatId::generate();
        self.chats.insert(
            chat_id,
            Chat {
                participants: vec![key.0, key.1],
                ..Default::default()
            },
        );
        self.private_chats.insert(key, chat_id);
        tracing::info!("Private chat {} created for '{}' and '{}'", chat_id, a, b);
        chat_id
    }
}

/// インメモリのチャット / メッセージストア
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    store: Mutex<Store>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group chat with the given participants.
    pub async fn create_group_chat(&self, participants: Vec<UserId>) -> ChatId {
        let chat_id = ChatId::generate();
        let mut store = self.store.lock().await;
        store.chats.insert(
            chat_id,
            Chat {
                participants,
                ..Default::default()
            },
        );
        chat_id
    }

    /// Last-read marker of `user_id` in `chat_id`.
    #[cfg(test)]
    pub async fn last_read(&self, chat_id: &ChatId, user_id: &UserId) -> Option<Timestamp> {
        let store = self.store.lock().await;
        store
            .chats
            .get(chat_id)
            .and_then(|chat| chat.last_read.get(user_id).copied())
    }

    /// Messages of a chat, oldest first.
    #[cfg(test)]
    pub async fn messages_in(&self, chat_id: &ChatId) -> Vec<Message> {
        let store = self.store.lock().await;
        let mut messages: Vec<Message> = store
            .messages
            .values()
            .filter(|message| message.chat_id.as_ref() == Some(chat_id))
            .cloned()
            .collect();
        messages.sort_by_key(|message| message.created_at);
        messages
    }
}

#[async_trait]
impl MessageService for InMemoryChatStore {
    async fn save_message(&self, message: &Message) -> Result<ChatId, ServiceError> {
        let mut store = self.store.lock().await;

        let chat_id = match (message.chat_id, message.receiver_id) {
            (Some(chat_id), _) => {
                let chat = store
                    .chats
                    .get(&chat_id)
                    .ok_or_else(|| ServiceError::NotFound(format!("chat {chat_id}")))?;
                if !chat.participants.contains(&message.sender_id) {
                    return Err(ServiceError::Forbidden(format!(
                        "user {} is not a participant of chat {}",
                        message.sender_id, chat_id
                    )));
                }
                chat_id
            }
            (None, Some(receiver_id)) => store.private_chat(message.sender_id, receiver_id),
            (None, None) => {
                return Err(ServiceError::NotFound(
                    "chat for message without chat_id or receiver_id".to_string(),
                ));
            }
        };

        let mut stored = message.clone();
        stored.chat_id = Some(chat_id);
        store.messages.insert(stored.id, stored);

        Ok(chat_id)
    }

    async fn get_message_by_id(&self, message_id: &MessageId) -> Result<Message, ServiceError> {
        let store = self.store.lock().await;
        store
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("message {message_id}")))
    }

    async fn update_last_read_ts(
        &self,
        timestamp: Timestamp,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<(), ServiceError> {
        let mut store = self.store.lock().await;
        let chat = store
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| ServiceError::NotFound(format!("chat {chat_id}")))?;

        // 既読位置は後退させない
        let marker = chat.last_read.entry(*user_id).or_insert(timestamp);
        if *marker < timestamp {
            *marker = timestamp;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatService for InMemoryChatStore {
    async fn get_chat_participants(&self, chat_id: &ChatId) -> Result<Vec<UserId>, ServiceError> {
        let store = self.store.lock().await;
        store
            .chats
            .get(chat_id)
            .map(|chat| chat.participants.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("chat {chat_id}")))
    }
}
