//! UseCase layer
//!
//! - `command_router`: コマンド名からハンドラへのディスパッチテーブル
//! - `message_dispatcher`: "message" / "message_read" のビジネスロジック

pub mod command_router;
pub mod error;
pub mod message_dispatcher;

pub use command_router::{CommandContext, CommandKind, CommandRouter};
pub use error::{CommandError, RouterError};
pub use message_dispatcher::{DeliveryReport, MessageDispatcher};
