//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tayori_shared::time::Clock;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    domain::{ConnectionRegistry, ProfileService},
    usecase::CommandRouter,
};

use super::{
    handler::{health_check, presence, websocket_handler},
    keepalive::KeepaliveConfig,
    signal::shutdown_signal,
    state::AppState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub keepalive: KeepaliveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            keepalive: KeepaliveConfig::default(),
        }
    }
}

/// WebSocket chat transport server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(config, registry, router, profile_service, clock);
/// server.run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    /// ConnectionRegistry（接続レジストリ）
    registry: Arc<ConnectionRegistry>,
    /// CommandRouter（起動時にハンドラ登録済み）
    router: Arc<CommandRouter>,
    /// ProfileService（最終オンライン時刻の更新）
    profile_service: Arc<dyn ProfileService>,
    clock: Arc<dyn Clock>,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        registry: Arc<ConnectionRegistry>,
        router: Arc<CommandRouter>,
        profile_service: Arc<dyn ProfileService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            registry,
            router,
            profile_service,
            clock,
        }
    }

    /// Build the axum application.
    pub fn app(&self) -> Router {
        let app_state = Arc::new(AppState {
            registry: self.registry.clone(),
            router: self.router.clone(),
            profile_service: self.profile_service.clone(),
            clock: self.clock.clone(),
            keepalive: self.config.keepalive,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/presence/{user_id}", get(presence))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Serve on an already bound listener until `shutdown` resolves, then close
    /// every live connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.app();

        tracing::info!(
            "WebSocket chat server listening on {}",
            listener.local_addr()?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        // アップグレード済みの WebSocket は graceful shutdown の対象外なので明示的に閉じる
        let closed = self.registry.close_all().await;
        tracing::info!("Server shutdown complete ({} connection(s) closed)", closed);

        Ok(())
    }

    /// Bind to the configured address and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the configured address or
    /// if there's an error during server execution.
    pub async fn run(self) -> std::io::Result<()> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Connect to: ws://{}/ws?user_id=<uuid>", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }
}
