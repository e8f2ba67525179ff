//! UI layer
//!
//! axum のルーター、WebSocket のアップグレード境界、HTTP エンドポイント、
//! 接続ごとの keepalive を提供します。

mod handler;
pub mod keepalive;
mod server;
mod signal;
pub mod state;

pub use handler::command::register_message_handlers;
pub use keepalive::{KeepaliveConfig, KeepaliveConfigError};
pub use server::{Server, ServerConfig};
