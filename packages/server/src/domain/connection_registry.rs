//! Connection registry
//!
//! ## 責務
//!
//! - user_id → 現在の `Connection` のマップを管理する（プレゼンスの唯一の情報源）
//! - 1 ユーザーにつき登録は最大 1 件。再接続時は古い接続を close してから置き換える
//!
//! 書き込み（接続・切断）は稀で、読み込み（ファンアウト時の在席確認）は頻繁なため
//! `RwLock` で保護します。

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{connection::Connection, value_object::UserId};

/// Registry of live connections, one per user.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<UserId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` as the current connection of `user_id`.
    ///
    /// A previously registered connection is closed before it is replaced.
    pub async fn add_connection(&self, user_id: UserId, connection: Connection) {
        let mut connections = self.connections.write().await;
        if let Some(previous) = connections.get(&user_id) {
            if previous.id() != connection.id() {
                previous.close();
                tracing::info!(
                    "Connection {} of user '{}' superseded by {}",
                    previous.id(),
                    user_id,
                    connection.id()
                );
            }
        }
        connections.insert(user_id, connection);
        tracing::debug!("User '{}' registered to ConnectionRegistry", user_id);
    }

    /// Remove and close the connection of `user_id`. No-op if there is none.
    ///
    /// Returns whether an entry was removed.
    pub async fn remove_and_close_connection(&self, user_id: &UserId) -> bool {
        let removed = self.connections.write().await.remove(user_id);
        match removed {
            Some(connection) => {
                connection.close();
                tracing::debug!("User '{}' unregistered from ConnectionRegistry", user_id);
                true
            }
            None => false,
        }
    }

    /// Current connection of `user_id`, if online.
    pub async fn is_connected(&self, user_id: &UserId) -> Option<Connection> {
        self.connections.read().await.get(user_id).cloned()
    }

    /// Teardown path of a single connection: close it, and remove its entry only
    /// if it is still the current connection of its user.
    ///
    /// Returns whether an entry was removed.
    pub async fn release(&self, connection: &Connection) -> bool {
        connection.close();
        let mut connections = self.connections.write().await;
        let is_current = connections
            .get(&connection.user_id())
            .is_some_and(|current| current.id() == connection.id());
        if is_current {
            connections.remove(&connection.user_id());
            tracing::debug!(
                "User '{}' unregistered from ConnectionRegistry",
                connection.user_id()
            );
        }
        is_current
    }

    /// Close and remove every registered connection (server shutdown).
    ///
    /// Returns the number of connections closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Connection> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, connection)| connection).collect()
        };
        for connection in &drained {
            connection.close();
        }
        drained.len()
    }

    pub async fn connected_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
