//! Command handler registration.
//!
//! ワイヤ上のフォーム（DTO）をドメインの入力に変換し、`MessageDispatcher` へ委譲する
//! ハンドラをコマンドルーターに登録します。

use std::sync::Arc;

use crate::{
    domain::{MessageDraft, ReadAck},
    infrastructure::dto::websocket::{MessageForm, MessageReadForm},
    usecase::{CommandError, CommandKind, CommandRouter, MessageDispatcher, RouterError},
};

/// Register the "message" and "message_read" handlers.
///
/// # Errors
///
/// Returns [`RouterError::DuplicateHandler`] if either command already has a handler.
pub fn register_message_handlers(
    router: &mut CommandRouter,
    dispatcher: Arc<MessageDispatcher>,
) -> Result<(), RouterError> {
    let message_dispatcher = dispatcher.clone();
    router.register_handler(
        CommandKind::Message,
        move |ctx, sender_id, form: MessageForm| {
            let dispatcher = message_dispatcher.clone();
            async move {
                let draft = MessageDraft::try_from(form)?;
                dispatcher.handle_message(&ctx, sender_id, draft).await?;
                Ok::<(), CommandError>(())
            }
        },
    )?;

    router.register_handler(
        CommandKind::MessageRead,
        move |ctx, reader_id, form: MessageReadForm| {
            let dispatcher = dispatcher.clone();
            async move {
                let ack = ReadAck::try_from(form)?;
                dispatcher.handle_message_read(&ctx, reader_id, ack).await?;
                Ok::<(), CommandError>(())
            }
        },
    )?;

    Ok(())
}
