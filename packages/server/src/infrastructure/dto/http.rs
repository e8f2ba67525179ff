//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Response of `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    /// Number of live WebSocket connections.
    pub connections: usize,
}

/// Response of `GET /api/presence/{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceDto {
    pub user_id: String,
    pub online: bool,
    /// RFC 3339 start of the current connection, if online.
    pub connected_at: Option<String>,
}
