//! WebSocket connection handlers.
//!
//! 接続ごとに 3 つの処理が動きます。
//!
//! - inbound listener（このタスク）: 受信フレームをデコードしてコマンドルーターへ渡す
//! - pusher loop: `Connection` のチャンネルに積まれたフレームを WebSocket へ書き込む
//! - keepalive: 定期的に ping を送り、応答のない接続を close する
//!
//! いずれかが `Connection::close()` を呼ぶと、残りもすべて終了します。

use std::{fmt, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{
    sink::{Sink, SinkExt},
    stream::{SplitStream, StreamExt},
};
use serde::Deserialize;
use tokio::time::timeout;

use crate::{
    domain::{Connection, OutboundFrame, OutboundReceiver, Timestamp, UserId},
    infrastructure::dto::{
        conversion::{encode_error, encode_push},
        websocket::InboundEnvelope,
    },
    ui::{
        keepalive::{Liveness, spawn_keepalive},
        state::AppState,
    },
    usecase::{CommandContext, CommandError},
};

const BINARY_NOT_SUPPORTED: &str = "binary frames are not supported";

/// Upper bound on the close handshake once a connection has been closed.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Query parameters for WebSocket connection
///
/// The user is authenticated upstream; `user_id` is the identity it established.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = match UserId::parse("user_id", &query.user_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejecting WebSocket upgrade: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let (sender, receiver) = socket.split();

    let (connection, rx) = Connection::open(user_id, Timestamp::new(state.clock.now_millis()));
    state
        .registry
        .add_connection(user_id, connection.clone())
        .await;
    tracing::info!("User '{}' connected ({})", user_id, connection.id());

    let liveness = Arc::new(Liveness::default());
    let pusher = pusher_loop(connection.clone(), rx, sender);
    let keepalive = spawn_keepalive(connection.clone(), liveness.clone(), state.keepalive);

    inbound_listener(&state, &connection, &liveness, receiver).await;

    // 後始末: close → 最終オンライン時刻の更新 → レジストリからの削除
    connection.close();
    if let Err(e) = state.profile_service.update_last_seen(&user_id).await {
        tracing::warn!("Failed to update last seen of '{}': {}", user_id, e);
    }
    state.registry.release(&connection).await;

    let (pusher_result, keepalive_result) = tokio::join!(pusher, keepalive);
    if let Err(e) = pusher_result.and(keepalive_result) {
        tracing::error!("Connection task of '{}' failed: {}", user_id, e);
    }
    let session_millis = state.clock.now_millis() - connection.connected_at().value();
    tracing::info!(
        "User '{}' disconnected ({}) after {}ms",
        user_id,
        connection.id(),
        session_millis
    );
}

/// Spawns the writer task of a connection.
///
/// Frames queued on the connection's channel are encoded and written to the
/// sink until the connection closes. Every write races the connection's
/// token, so a peer that stopped reading cannot pin the task once the
/// connection is closed. A write failure closes the connection.
fn pusher_loop<S>(
    connection: Connection,
    mut rx: OutboundReceiver,
    mut sender: S,
) -> tokio::task::JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: fmt::Display,
{
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                // 既に積まれたフレームを優先して書き出す
                biased;
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                _ = connection.closed() => break,
            };

            let message = match encode_frame(frame) {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!("Failed to encode frame for '{}': {}", connection.user_id(), e);
                    continue;
                }
            };

            let written = tokio::select! {
                written = sender.send(message) => written,
                _ = connection.closed() => {
                    tracing::debug!(
                        "Connection {} closed while a write was pending",
                        connection.id()
                    );
                    break;
                }
            };
            if let Err(e) = written {
                tracing::warn!("Failed to write to '{}': {}", connection.user_id(), e);
                connection.close();
                break;
            }
        }

        // 相手が読み込みを止めている場合に備え、close フレームの送信は待ち時間を区切る
        if timeout(CLOSE_GRACE, sender.close()).await.is_err() {
            tracing::debug!(
                "Close handshake of connection {} timed out, dropping socket",
                connection.id()
            );
        }
    })
}

fn encode_frame(frame: OutboundFrame) -> Result<Message, serde_json::Error> {
    let message = match frame {
        OutboundFrame::Push(push) => Message::Text(encode_push(push)?.into()),
        OutboundFrame::Error(error_code) => Message::Text(encode_error(error_code)?.into()),
        OutboundFrame::Ping => Message::Ping(Bytes::new()),
    };
    Ok(message)
}

/// Reads frames until the peer goes away or the connection is closed from
/// another path. Per-frame failures are reported back and never end the loop.
async fn inbound_listener(
    state: &AppState,
    connection: &Connection,
    liveness: &Liveness,
    mut receiver: SplitStream<WebSocket>,
) {
    let user_id = connection.user_id();

    loop {
        let next = tokio::select! {
            _ = connection.closed() => {
                tracing::debug!("Connection {} closed, stopping listener", connection.id());
                break;
            }
            next = receiver.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => {
                // pong に限らず、読めたフレームはすべて生存の証拠とみなす
                liveness.record_activity();
                msg
            }
            Some(Err(e)) => {
                tracing::warn!("WebSocket error from '{}': {}", user_id, e);
                break;
            }
            None => {
                tracing::debug!("WebSocket stream of '{}' ended", user_id);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let ctx = CommandContext {
                    connection_id: connection.id(),
                    received_at: Timestamp::new(state.clock.now_millis()),
                };
                if let Err(e) = handle_text_frame(state, ctx, user_id, text.as_str()).await {
                    tracing::warn!("Command from '{}' failed: {}", user_id, e);
                    if connection.send_error(e.to_string()).is_err() {
                        break;
                    }
                }
            }
            Message::Binary(_) => {
                tracing::warn!("Binary frame from '{}' rejected", user_id);
                if connection.send_error(BINARY_NOT_SUPPORTED).is_err() {
                    break;
                }
            }
            Message::Pong(_) => {
                tracing::trace!("Received pong from '{}'", user_id);
            }
            Message::Ping(_) => {
                // pong は WebSocket プロトコル層が自動で返す
                tracing::trace!("Received ping from '{}'", user_id);
            }
            Message::Close(_) => {
                tracing::info!("User '{}' requested close", user_id);
                break;
            }
        }
    }
}

async fn handle_text_frame(
    state: &AppState,
    ctx: CommandContext,
    user_id: UserId,
    text: &str,
) -> Result<(), CommandError> {
    let envelope: InboundEnvelope =
        serde_json::from_str(text).map_err(|e| CommandError::MalformedFrame(e.to_string()))?;

    state
        .router
        .route(ctx, &envelope.r#type, user_id, envelope.payload)
        .await
}
