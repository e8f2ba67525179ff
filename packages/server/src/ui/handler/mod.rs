//! Request handlers.

pub mod command;
mod http;
mod websocket;

pub use http::{health_check, presence};
pub use websocket::websocket_handler;
