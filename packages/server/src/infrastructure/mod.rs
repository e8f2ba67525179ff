//! Infrastructure layer
//!
//! - `dto`: ワイヤフォーマット（WebSocket / HTTP）とドメインモデルとの変換
//! - `service`: 外部コラボレーター trait のインメモリ実装

pub mod dto;
pub mod service;
