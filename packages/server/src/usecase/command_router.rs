//! Command router
//!
//! ## 概要
//!
//! ワイヤ上のコマンド名（文字列）を既知のコマンド種別 `CommandKind` に照合し、
//! 登録済みのハンドラへディスパッチします。文字列での照合は境界でのみ行い、
//! ハンドラはデコード済みの型付きペイロードを受け取ります。
//!
//! ハンドラの登録は起動時に一度だけ行います（単一ライター）。登録後は
//! `Arc<CommandRouter>` として共有し、読み取り専用で使います。

use std::{collections::HashMap, fmt, future::Future, str::FromStr};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;

use crate::domain::{ConnectionId, Timestamp, UserId};

use super::error::{CommandError, RouterError};

/// Closed set of inbound command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Message,
    MessageRead,
}

impl CommandKind {
    pub const ALL: [CommandKind; 2] = [CommandKind::Message, CommandKind::MessageRead];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageRead => "message_read",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CommandError::NoHandler(s.to_string()))
    }
}

/// Per-frame context handed to every handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    /// Connection the frame arrived on.
    pub connection_id: ConnectionId,
    /// Time the frame was read off the socket. Stamped on new messages.
    pub received_at: Timestamp,
}

type BoxedHandler = Box<
    dyn Fn(CommandContext, UserId, serde_json::Value) -> BoxFuture<'static, Result<(), CommandError>>
        + Send
        + Sync,
>;

/// Dispatch table of command handlers.
#[derive(Default)]
pub struct CommandRouter {
    handlers: HashMap<CommandKind, BoxedHandler>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    ///
    /// The payload of every routed frame is decoded into `P` before the handler
    /// runs; a payload that does not decode fails with
    /// [`CommandError::InvalidPayload`] without invoking the handler.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateHandler`] if `kind` already has a handler.
    pub fn register_handler<P, F, Fut>(
        &mut self,
        kind: CommandKind,
        handler: F,
    ) -> Result<(), RouterError>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(CommandContext, UserId, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        if self.handlers.contains_key(&kind) {
            return Err(RouterError::DuplicateHandler(kind));
        }

        let boxed: BoxedHandler =
            Box::new(move |ctx, user_id, payload| match serde_json::from_value::<P>(payload) {
                Ok(form) => handler(ctx, user_id, form).boxed(),
                Err(e) => future::ready(Err(CommandError::InvalidPayload {
                    kind,
                    reason: e.to_string(),
                }))
                .boxed(),
            });
        self.handlers.insert(kind, boxed);
        tracing::debug!("Registered handler for command '{}'", kind);

        Ok(())
    }

    /// Route one decoded frame to its handler and run it on the caller's task.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::NoHandler`] for unknown or unregistered command
    /// names, otherwise whatever the handler returns.
    pub async fn route(
        &self,
        ctx: CommandContext,
        command_name: &str,
        user_id: UserId,
        payload: serde_json::Value,
    ) -> Result<(), CommandError> {
        let handler = command_name
            .parse::<CommandKind>()
            .ok()
            .and_then(|kind| self.handlers.get(&kind))
            .ok_or_else(|| CommandError::NoHandler(command_name.to_string()))?;

        handler(ctx, user_id, payload).await
    }
}
