//! Live connection handle
//!
//! ## 設計ノート
//!
//! WebSocket の生成と書き込みは UI 層が担当します。`Connection` は書き込みタスクへの
//! チャンネルと、接続のライフタイムに紐づく `CancellationToken` を保持するハンドルです。
//! `close()` でトークンをキャンセルすると、読み込みループ・書き込みタスク・ping タスクが
//! すべて終了します。

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    entity::OutboundPush,
    value_object::{ConnectionId, Timestamp, UserId},
};

/// Frames queued for the connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Push(OutboundPush),
    /// Recoverable per-frame failure reported back to the client.
    Error(String),
    Ping,
}

pub type OutboundChannel = mpsc::UnboundedSender<OutboundFrame>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<OutboundFrame>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Handle to one live connection of a user. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    sender: OutboundChannel,
    cancel: CancellationToken,
    connected_at: Timestamp,
}

impl Connection {
    /// Create a connection handle and the receiving end for its writer task.
    pub fn open(user_id: UserId, connected_at: Timestamp) -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::generate(),
            user_id,
            sender,
            cancel: CancellationToken::new(),
            connected_at,
        };
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    pub fn push(&self, push: OutboundPush) -> Result<(), PushError> {
        self.enqueue(OutboundFrame::Push(push))
    }

    pub fn send_error(&self, error_code: impl Into<String>) -> Result<(), PushError> {
        self.enqueue(OutboundFrame::Error(error_code.into()))
    }

    pub fn ping(&self) -> Result<(), PushError> {
        self.enqueue(OutboundFrame::Ping)
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection has been closed from any path.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    fn enqueue(&self, frame: OutboundFrame) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::Closed(self.id));
        }
        self.sender
            .send(frame)
            .map_err(|_| PushError::Closed(self.id))
    }
}
