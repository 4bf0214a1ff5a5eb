//! UseCase: メッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() メソッド
//! - 送信者のアクティブな text チャンネルへの配信と、永続化してからの配信
//!
//! ### なぜこのテストが必要か
//! - 配信されたメッセージは必ず永続化済みでなければならない（再参加時の履歴と食い違わない）
//! - 添付ファイル情報はクライアントから型の緩い形で届くため、正規化を保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：本文のみ、添付ファイルのみ
//! - エッジケース：上限を超える本文（切り詰め）、空の本文（黙って捨てる）
//! - 異常系：text チャンネル未参加、永続化の失敗

use std::sync::Arc;

use tsudoi_shared::time::Clock;

use crate::{
    config::ServerConfig,
    domain::{
        Attachment, ChannelKind, ChatStore, ConnectionId, ConnectionRepository, Message, MessageId,
        MessagePusher, MessageView, RawAttachment, RoomEvent, RoomRepository, Timestamp,
    },
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room, truncate_chars, with_timeout},
};

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    config: ServerConfig,
}

impl SendMessageUseCase {
    pub fn new(
        room_repository: Arc<dyn RoomRepository>,
        connection_repository: Arc<dyn ConnectionRepository>,
        chat_store: Arc<dyn ChatStore>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        config: ServerConfig,
    ) -> Self {
        Self {
            room_repository,
            connection_repository,
            chat_store,
            message_pusher,
            clock,
            config,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 送信者の接続
    /// * `text` - 本文（上限を超えた分は切り詰める）
    /// * `attachment` - 添付ファイル情報（URL が無ければ無視する）
    ///
    /// # Returns
    ///
    /// * `Ok(MessageView)` - 永続化され、チャンネルの全メンバー（送信者を含む）に配信されたメッセージ
    /// * `Err(RoomActionError::EmptyMessage)` - 本文も添付も無い
    /// * `Err(RoomActionError::NoActiveTextChannel)` - text チャンネルに参加していない
    /// * `Err(RoomActionError::Persistence)` - 永続化の失敗（配信しない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        text: String,
        attachment: Option<RawAttachment>,
    ) -> Result<MessageView, RoomActionError> {
        let text = truncate_chars(text.trim(), self.config.max_message_len);
        let attachment = attachment
            .and_then(|raw| Attachment::sanitize(raw, self.config.max_attachment_name_len));
        if text.is_empty() && attachment.is_none() {
            return Err(RoomActionError::EmptyMessage);
        }

        let (room_id, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let guard = room.lock().await;
        let member = guard
            .member(connection_id)
            .ok_or(RoomActionError::NotInRoom)?;
        let channel_id = member
            .active_channel(ChannelKind::Text)
            .cloned()
            .ok_or(RoomActionError::NoActiveTextChannel)?;

        let message = Message {
            id: MessageId::generate(),
            channel_id: channel_id.clone(),
            author_id: member.identity.user_id.clone(),
            author_name: member.identity.display_name.clone(),
            text,
            attachment,
            reply_to: None,
            created_at: Timestamp::new(self.clock.now_millis()),
        };

        with_timeout(
            self.config.store_timeout,
            self.chat_store.save_message(&room_id, &message),
        )
        .await
        .inspect_err(|e| {
            tracing::error!(room_id = %room_id, channel_id = %channel_id, "Failed to persist message: {}", e);
        })?;

        let view = MessageView::fresh(message);
        let targets = guard.channel_member_ids(&channel_id);
        tracing::debug!(
            connection_id = %connection_id,
            channel_id = %channel_id,
            targets = targets.len(),
            "Broadcasting chat message"
        );
        broadcast(
            self.message_pusher.as_ref(),
            targets,
            &RoomEvent::ChatMessage(view.clone()),
        )
        .await;

        Ok(view)
    }
}
