//! 外部コラボレーターの実装
//!
//! ## 実装
//!
//! - `inmemory`: HashMap を使ったインメモリ実装（単一プロセスでの動作確認・テスト用）
//! - 本番環境では外部のメッセージ / チャット / プロフィールサービスに差し替える

pub mod inmemory;

pub use inmemory::{InMemoryChatStore, InMemoryProfileService};
