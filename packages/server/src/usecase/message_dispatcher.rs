//! UseCase: メッセージ送信・既読通知
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - MessageDispatcher::handle_message() / handle_message_read()
//! - 永続化の委譲、参加者へのファンアウト、既読通知の宛先選定
//!
//! ### なぜこのテストが必要か
//! - ファンアウトはオンラインの参加者にのみ、各 1 回だけ届く必要がある
//! - 既読通知は元のメッセージ送信者にのみ届く必要がある
//! - 一部の宛先への送信失敗が他の宛先への配信を止めないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：グループチャットへの送信、既読通知
//! - 異常系：永続化の失敗、チャット不一致
//! - エッジケース：送信者がオフライン、宛先の接続が既に閉じている

use std::{collections::HashSet, sync::Arc};

use crate::domain::{
    ChatId, ChatService, ConnectionRegistry, Message, MessageDraft, MessageId, MessagePush,
    MessageService, OutboundPush, ProfileService, ReadAck, ReadReceipt, UserId, ValidationError,
};

use super::{command_router::CommandContext, error::CommandError};

/// Outcome of a successful "message" command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    /// Participants whose connection accepted the push.
    pub delivered_to: Vec<UserId>,
}

/// Business logic of the "message" and "message_read" commands.
pub struct MessageDispatcher {
    message_service: Arc<dyn MessageService>,
    chat_service: Arc<dyn ChatService>,
    profile_service: Arc<dyn ProfileService>,
    registry: Arc<ConnectionRegistry>,
}

impl MessageDispatcher {
    pub fn new(
        message_service: Arc<dyn MessageService>,
        chat_service: Arc<dyn ChatService>,
        profile_service: Arc<dyn ProfileService>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            message_service,
            chat_service,
            profile_service,
            registry,
        }
    }

    /// Persist a message from `sender_id` and push it to every online participant
    /// of its chat except the sender. The message is stamped with the time its
    /// frame was received.
    ///
    /// # Errors
    ///
    /// Validation and collaborator failures. Push failures to individual
    /// recipients are logged and never returned.
    pub async fn handle_message(
        &self,
        ctx: &CommandContext,
        sender_id: UserId,
        draft: MessageDraft,
    ) -> Result<DeliveryReport, CommandError> {
        let message = Message::compose(
            MessageId::generate(),
            sender_id,
            draft,
            ctx.received_at,
        )?;
        let message_id = message.id;

        // 1. 永続化（receiver_id のみの場合はプライベートチャットが解決・作成される）
        let chat_id = self.message_service.save_message(&message).await?;
        tracing::info!(
            "Message {} from '{}' saved to chat {} (connection {})",
            message_id,
            sender_id,
            chat_id,
            ctx.connection_id
        );

        // 2. 送信者のプロフィールと参加者リストを取得
        let sender = self
            .profile_service
            .get_public_user_info(&sender_id)
            .await?;
        let participants = self.chat_service.get_chat_participants(&chat_id).await?;

        // 3. オンラインの参加者へファンアウト（送信者自身には送らない）
        let push = OutboundPush::Message(MessagePush::new(message, chat_id, sender));
        let delivered_to = self.fan_out(&push, participants, &sender_id).await;

        Ok(DeliveryReport {
            message_id,
            chat_id,
            delivered_to,
        })
    }

    /// Move `reader_id`'s last-read marker to the acknowledged message and notify
    /// the message's original sender if they are online.
    ///
    /// Returns the notified user, if any.
    ///
    /// # Errors
    ///
    /// Validation and collaborator failures.
    pub async fn handle_message_read(
        &self,
        ctx: &CommandContext,
        reader_id: UserId,
        ack: ReadAck,
    ) -> Result<Option<UserId>, CommandError> {
        let message = self
            .message_service
            .get_message_by_id(&ack.message_id)
            .await?;
        if message.chat_id != Some(ack.chat_id) {
            return Err(ValidationError::ChatMismatch {
                message_id: ack.message_id,
                chat_id: ack.chat_id,
            }
            .into());
        }

        self.message_service
            .update_last_read_ts(message.created_at, &ack.chat_id, &reader_id)
            .await?;
        tracing::debug!(
            "User '{}' read chat {} up to message {} (connection {})",
            reader_id,
            ack.chat_id,
            ack.message_id,
            ctx.connection_id
        );

        if message.sender_id == reader_id {
            return Ok(None);
        }

        let Some(connection) = self.registry.is_connected(&message.sender_id).await else {
            tracing::debug!(
                "Sender '{}' of message {} is offline, skipping read receipt",
                message.sender_id,
                ack.message_id
            );
            return Ok(None);
        };

        let receipt = ReadReceipt {
            message_id: ack.message_id,
            chat_id: ack.chat_id,
            sender_id: reader_id,
            timestamp: message.created_at,
        };
        match connection.push(OutboundPush::MessageRead(receipt)) {
            Ok(()) => Ok(Some(message.sender_id)),
            Err(e) => {
                tracing::warn!(
                    "Failed to push read receipt to '{}': {}",
                    message.sender_id,
                    e
                );
                Ok(None)
            }
        }
    }

    async fn fan_out(
        &self,
        push: &OutboundPush,
        participants: Vec<UserId>,
        sender_id: &UserId,
    ) -> Vec<UserId> {
        let mut seen = HashSet::new();
        let mut delivered = Vec::new();

        for participant in participants {
            if &participant == sender_id || !seen.insert(participant) {
                continue;
            }
            let Some(connection) = self.registry.is_connected(&participant).await else {
                continue;
            };
            // 一部の送信失敗は許容し、残りの宛先への配信を続ける
            match connection.push(push.clone()) {
                Ok(()) => delivered.push(participant),
                Err(e) => tracing::warn!("Failed to push message to '{}': {}", participant, e),
            }
        }

        tracing::debug!(
            "Pushed {} to {} online participant(s)",
            push.kind(),
            delivered.len()
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::domain::{
        Connection, ConnectionId, MessageContent, MockChatService, MockMessageService,
        MockProfileService, OutboundFrame, OutboundReceiver, PublicProfile, ServiceError,
        Timestamp,
    };

    const NOW: i64 = 1_700_000_000_000;

    fn ctx() -> CommandContext {
        CommandContext {
            connection_id: ConnectionId::generate(),
            received_at: Timestamp::new(NOW),
        }
    }

    fn profile(user_id: UserId, name: &str) -> PublicProfile {
        PublicProfile {
            user_id,
            username: name.to_string(),
            avatar_url: None,
        }
    }

    fn draft_to_chat(chat_id: ChatId, text: &str) -> MessageDraft {
        let content = MessageContent::new(text.to_string(), vec![]).unwrap();
        MessageDraft::new(Some(chat_id), None, content).unwrap()
    }

    async fn connect(registry: &ConnectionRegistry, user_id: UserId) -> OutboundReceiver {
        let (connection, rx) = Connection::open(user_id, Timestamp::new(NOW));
        registry.add_connection(user_id, connection).await;
        rx
    }

    fn dispatcher(
        message_service: MockMessageService,
        chat_service: MockChatService,
        profile_service: MockProfileService,
        registry: Arc<ConnectionRegistry>,
    ) -> MessageDispatcher {
        MessageDispatcher::new(
            Arc::new(message_service),
            Arc::new(chat_service),
            Arc::new(profile_service),
            registry,
        )
    }

    fn stored_message(id: MessageId, chat_id: ChatId, sender_id: UserId) -> Message {
        let draft = draft_to_chat(chat_id, "hi");
        Message::compose(id, sender_id, draft, Timestamp::new(NOW - 5)).unwrap()
    }

    #[tokio::test]
    async fn test_handle_message_fans_out_to_online_participants() {
        // テスト項目: オンラインの参加者 B, C にだけ 1 回ずつ届き、送信者 A と非参加者 D には届かない
        // given (前提条件):
        let (a, b, c, d) = (
            UserId::generate(),
            UserId::generate(),
            UserId::generate(),
            UserId::generate(),
        );
        let chat_id = ChatId::generate();
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_a = connect(&registry, a).await;
        let mut rx_b = connect(&registry, b).await;
        let mut rx_c = connect(&registry, c).await;
        let mut rx_d = connect(&registry, d).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_save_message()
            .times(1)
            .returning(move |message| {
                assert_eq!(message.chat_id, Some(chat_id));
                Ok(chat_id)
            });
        let mut chat_service = MockChatService::new();
        chat_service
            .expect_get_chat_participants()
            .with(eq(chat_id))
            .times(1)
            .returning(move |_| Ok(vec![a, b, c]));
        let mut profile_service = MockProfileService::new();
        profile_service
            .expect_get_public_user_info()
            .with(eq(a))
            .returning(move |_| Ok(profile(a, "alice")));
        let dispatcher = dispatcher(message_service, chat_service, profile_service, registry);

        // when (操作):
        let report = dispatcher
            .handle_message(&ctx(), a, draft_to_chat(chat_id, "hi"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.chat_id, chat_id);
        assert_eq!(report.delivered_to, vec![b, c]);
        for rx in [&mut rx_b, &mut rx_c] {
            match rx.try_recv() {
                Ok(OutboundFrame::Push(OutboundPush::Message(push))) => {
                    assert_eq!(push.id, report.message_id);
                    assert_eq!(push.sender.username, "alice");
                    assert_eq!(push.content.text(), "hi");
                }
                other => panic!("unexpected frame: {other:?}"),
            }
            assert!(rx.try_recv().is_err());
        }
        assert!(rx_a.try_recv().is_err());
        assert!(rx_d.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_message_is_stamped_with_receive_time() {
        // テスト項目: メッセージの作成時刻はフレームを受信した時刻になる
        // given (前提条件):
        let (a, b) = (UserId::generate(), UserId::generate());
        let chat_id = ChatId::generate();
        let received_at = Timestamp::new(NOW - 250);
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_b = connect(&registry, b).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_save_message()
            .times(1)
            .returning(move |message| {
                assert_eq!(message.created_at, received_at);
                Ok(chat_id)
            });
        let mut chat_service = MockChatService::new();
        chat_service
            .expect_get_chat_participants()
            .returning(move |_| Ok(vec![a, b]));
        let mut profile_service = MockProfileService::new();
        profile_service
            .expect_get_public_user_info()
            .returning(move |_| Ok(profile(a, "alice")));
        let dispatcher = dispatcher(message_service, chat_service, profile_service, registry);
        let ctx = CommandContext {
            connection_id: ConnectionId::generate(),
            received_at,
        };

        // when (操作):
        dispatcher
            .handle_message(&ctx, a, draft_to_chat(chat_id, "hi"))
            .await
            .unwrap();

        // then (期待する結果):
        match rx_b.try_recv() {
            Ok(OutboundFrame::Push(OutboundPush::Message(push))) => {
                assert_eq!(push.created_at, received_at);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_message_skips_offline_and_closed_recipients() {
        // テスト項目: オフライン・接続済みだが閉じた宛先をスキップし、他の宛先には届く
        // given (前提条件):
        let (a, b, c, e) = (
            UserId::generate(),
            UserId::generate(),
            UserId::generate(),
            UserId::generate(),
        );
        let chat_id = ChatId::generate();
        let registry = Arc::new(ConnectionRegistry::new());
        let rx_b = connect(&registry, b).await;
        drop(rx_b); // b の書き込みタスクは既に終了している
        let mut rx_c = connect(&registry, c).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_save_message()
            .returning(move |_| Ok(chat_id));
        let mut chat_service = MockChatService::new();
        chat_service
            .expect_get_chat_participants()
            .returning(move |_| Ok(vec![a, b, c, c, e]));
        let mut profile_service = MockProfileService::new();
        profile_service
            .expect_get_public_user_info()
            .returning(move |_| Ok(profile(a, "alice")));
        let dispatcher = dispatcher(message_service, chat_service, profile_service, registry);

        // when (操作):
        let result = dispatcher
            .handle_message(&ctx(), a, draft_to_chat(chat_id, "hi"))
            .await;

        // then (期待する結果):
        let report = result.unwrap();
        assert_eq!(report.delivered_to, vec![c]);
        assert!(rx_c.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_message_to_receiver_uses_resolved_chat() {
        // テスト項目: receiver_id のみのメッセージは永続化で解決された chat_id で配信される
        // given (前提条件):
        let (a, b) = (UserId::generate(), UserId::generate());
        let resolved = ChatId::generate();
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_b = connect(&registry, b).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_save_message()
            .returning(move |message| {
                assert_eq!(message.chat_id, None);
                assert_eq!(message.receiver_id, Some(b));
                Ok(resolved)
            });
        let mut chat_service = MockChatService::new();
        chat_service
            .expect_get_chat_participants()
            .with(eq(resolved))
            .returning(move |_| Ok(vec![a, b]));
        let mut profile_service = MockProfileService::new();
        profile_service
            .expect_get_public_user_info()
            .returning(move |_| Ok(profile(a, "alice")));
        let dispatcher = dispatcher(message_service, chat_service, profile_service, registry);
        let content = MessageContent::new("hello".to_string(), vec![]).unwrap();
        let draft = MessageDraft::new(None, Some(b), content).unwrap();

        // when (操作):
        let report = dispatcher.handle_message(&ctx(), a, draft).await.unwrap();

        // then (期待する結果):
        assert_eq!(report.chat_id, resolved);
        match rx_b.try_recv() {
            Ok(OutboundFrame::Push(OutboundPush::Message(push))) => {
                assert_eq!(push.chat_id, resolved);
                assert_eq!(push.receiver_id, Some(b));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_message_persistence_failure_delivers_nothing() {
        // テスト項目: 永続化に失敗した場合はエラーを返し、誰にも配信しない
        // given (前提条件):
        let (a, b) = (UserId::generate(), UserId::generate());
        let chat_id = ChatId::generate();
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_b = connect(&registry, b).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_save_message()
            .returning(|_| Err(ServiceError::Unavailable("db down".to_string())));
        let mut chat_service = MockChatService::new();
        chat_service.expect_get_chat_participants().never();
        let profile_service = MockProfileService::new();
        let dispatcher = dispatcher(message_service, chat_service, profile_service, registry);

        // when (操作):
        let result = dispatcher
            .handle_message(&ctx(), a, draft_to_chat(chat_id, "hi"))
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(CommandError::Service(ServiceError::Unavailable(
                "db down".to_string()
            )))
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_message_to_self_has_no_side_effects() {
        // テスト項目: 自分宛のメッセージは検証エラーになり、永続化は呼ばれない
        // given (前提条件):
        let a = UserId::generate();
        let mut message_service = MockMessageService::new();
        message_service.expect_save_message().never();
        let dispatcher = dispatcher(
            message_service,
            MockChatService::new(),
            MockProfileService::new(),
            Arc::new(ConnectionRegistry::new()),
        );
        let content = MessageContent::new("hi".to_string(), vec![]).unwrap();
        let draft = MessageDraft::new(None, Some(a), content).unwrap();

        // when (操作):
        let result = dispatcher.handle_message(&ctx(), a, draft).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(CommandError::Validation(ValidationError::SelfMessage))
        );
    }

    #[tokio::test]
    async fn test_handle_message_read_notifies_only_original_sender() {
        // テスト項目: C の既読通知は元の送信者 A にだけ届き、B には届かない
        // given (前提条件):
        let (a, b, c) = (UserId::generate(), UserId::generate(), UserId::generate());
        let chat_id = ChatId::generate();
        let message_id = MessageId::generate();
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_a = connect(&registry, a).await;
        let mut rx_b = connect(&registry, b).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_get_message_by_id()
            .with(eq(message_id))
            .returning(move |_| Ok(stored_message(message_id, chat_id, a)));
        message_service
            .expect_update_last_read_ts()
            .with(eq(Timestamp::new(NOW - 5)), eq(chat_id), eq(c))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let dispatcher = dispatcher(
            message_service,
            MockChatService::new(),
            MockProfileService::new(),
            registry,
        );

        // when (操作):
        let notified = dispatcher
            .handle_message_read(
                &ctx(),
                c,
                ReadAck {
                    message_id,
                    chat_id,
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(notified, Some(a));
        assert_eq!(
            rx_a.try_recv().ok(),
            Some(OutboundFrame::Push(OutboundPush::MessageRead(ReadReceipt {
                message_id,
                chat_id,
                sender_id: c,
                timestamp: Timestamp::new(NOW - 5),
            })))
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_message_read_with_offline_sender_is_silent() {
        // テスト項目: 送信者がオフラインの場合、既読位置は更新されるが通知はしない
        // given (前提条件):
        let (a, c) = (UserId::generate(), UserId::generate());
        let chat_id = ChatId::generate();
        let message_id = MessageId::generate();

        let mut message_service = MockMessageService::new();
        message_service
            .expect_get_message_by_id()
            .returning(move |_| Ok(stored_message(message_id, chat_id, a)));
        message_service
            .expect_update_last_read_ts()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let dispatcher = dispatcher(
            message_service,
            MockChatService::new(),
            MockProfileService::new(),
            Arc::new(ConnectionRegistry::new()),
        );

        // when (操作):
        let result = dispatcher
            .handle_message_read(
                &ctx(),
                c,
                ReadAck {
                    message_id,
                    chat_id,
                },
            )
            .await;

        // then (期待する結果):
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_handle_message_read_rejects_chat_mismatch() {
        // テスト項目: メッセージが指定チャットに属さない場合は検証エラーで、既読位置は更新しない
        // given (前提条件):
        let (a, c) = (UserId::generate(), UserId::generate());
        let actual_chat = ChatId::generate();
        let other_chat = ChatId::generate();
        let message_id = MessageId::generate();

        let mut message_service = MockMessageService::new();
        message_service
            .expect_get_message_by_id()
            .returning(move |_| Ok(stored_message(message_id, actual_chat, a)));
        message_service.expect_update_last_read_ts().never();
        let dispatcher = dispatcher(
            message_service,
            MockChatService::new(),
            MockProfileService::new(),
            Arc::new(ConnectionRegistry::new()),
        );

        // when (操作):
        let result = dispatcher
            .handle_message_read(
                &ctx(),
                c,
                ReadAck {
                    message_id,
                    chat_id: other_chat,
                },
            )
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(CommandError::Validation(ValidationError::ChatMismatch {
                message_id,
                chat_id: other_chat,
            }))
        );
    }

    #[tokio::test]
    async fn test_handle_message_read_unknown_message() {
        // テスト項目: 存在しないメッセージの既読はコラボレーターのエラーになる
        // given (前提条件):
        let mut message_service = MockMessageService::new();
        message_service
            .expect_get_message_by_id()
            .returning(|id| Err(ServiceError::NotFound(format!("message {id}"))));
        let dispatcher = dispatcher(
            message_service,
            MockChatService::new(),
            MockProfileService::new(),
            Arc::new(ConnectionRegistry::new()),
        );

        // when (操作):
        let result = dispatcher
            .handle_message_read(
                &ctx(),
                UserId::generate(),
                ReadAck {
                    message_id: MessageId::generate(),
                    chat_id: ChatId::generate(),
                },
            )
            .await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(CommandError::Service(ServiceError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_handle_message_read_of_own_message_notifies_nobody() {
        // テスト項目: 自分のメッセージの既読は誰にも通知しない
        // given (前提条件):
        let a = UserId::generate();
        let chat_id = ChatId::generate();
        let message_id = MessageId::generate();
        let registry = Arc::new(ConnectionRegistry::new());
        let mut rx_a = connect(&registry, a).await;

        let mut message_service = MockMessageService::new();
        message_service
            .expect_get_message_by_id()
            .returning(move |_| Ok(stored_message(message_id, chat_id, a)));
        message_service
            .expect_update_last_read_ts()
            .returning(|_, _, _| Ok(()));
        let dispatcher = dispatcher(
            message_service,
            MockChatService::new(),
            MockProfileService::new(),
            registry,
        );

        // when (操作):
        let result = dispatcher
            .handle_message_read(
                &ctx(),
                a,
                ReadAck {
                    message_id,
                    chat_id,
                },
            )
            .await;

        // then (期待する結果):
        assert_eq!(result, Ok(None));
        assert!(rx_a.try_recv().is_err());
    }
}
