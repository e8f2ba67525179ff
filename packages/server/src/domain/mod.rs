//! Domain layer
//!
//! 値オブジェクト、エンティティ、外部サービスの trait、そして接続レジストリを定義します。
//! 永続化や認証は外部コラボレーターの責務であり、ここではインターフェースのみを持ちます。

pub mod connection;
pub mod connection_registry;
pub mod entity;
pub mod error;
pub mod service;
pub mod value_object;

pub use connection::{Connection, OutboundFrame, OutboundReceiver, PushError};
pub use connection_registry::ConnectionRegistry;
pub use entity::{
    MAX_ATTACHMENTS, MAX_TEXT_LENGTH, Message, MessageContent, MessageDraft, MessagePush,
    OutboundPush, PublicProfile, ReadAck, ReadReceipt,
};
pub use error::{ServiceError, ValidationError};
pub use service::{ChatService, MessageService, ProfileService};
pub use value_object::{ChatId, ConnectionId, MessageId, Timestamp, UserId};

#[cfg(test)]
pub use service::{MockChatService, MockMessageService, MockProfileService};
