//! Shared application state.

use std::sync::Arc;

use tayori_shared::time::Clock;

use crate::{
    domain::{ConnectionRegistry, ProfileService},
    usecase::CommandRouter,
};

use super::keepalive::KeepaliveConfig;

/// Shared application state
pub struct AppState {
    /// 接続レジストリ（プレゼンスの唯一の情報源）
    pub registry: Arc<ConnectionRegistry>,
    /// 起動時に構築済みのコマンドルーター（読み取り専用）
    pub router: Arc<CommandRouter>,
    /// 切断時の最終オンライン時刻の更新に使用
    pub profile_service: Arc<dyn ProfileService>,
    pub clock: Arc<dyn Clock>,
    pub keepalive: KeepaliveConfig,
}
