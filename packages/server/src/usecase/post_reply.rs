//! UseCase: スレッドへの返信
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - PostReplyUseCase::execute() メソッド
//! - thread-updated（スレッドを開いているメンバー）と message-reply-count-changed（チャンネルのメンバー）の配信
//!
//! ### なぜこのテストが必要か
//! - 返信はメインフィードに流れず、親メッセージの返信数だけが更新される
//! - スレッドは 1 階層のみ（返信への返信は受け付けない）
//!
//! ### どのような状況を想定しているか
//! - 正常系：返信と配信
//! - 異常系：存在しない親メッセージ、返信への返信、空の本文

use std::sync::Arc;

use tsudoi_shared::time::Clock;

use crate::{
    config::ServerConfig,
    domain::{
        ChatStore, ConnectionId, ConnectionRepository, Message, MessageId, MessagePusher,
        MessageView, RoomEvent, RoomRepository, Timestamp,
    },
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room, resolve_views, truncate_chars, with_timeout},
};

/// スレッド返信のユースケース
pub struct PostReplyUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    config: ServerConfig,
}

impl PostReplyUseCase {
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

    /// 親メッセージに返信する
    ///
    /// 返信は親メッセージと同じチャンネルに属する。投稿者はそのスレッドを開いている状態になる。
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        parent_id: MessageId,
        text: String,
    ) -> Result<MessageView, RoomActionError> {
        let text = truncate_chars(text.trim(), self.config.max_message_len);
        if text.is_empty() {
            return Err(RoomActionError::EmptyMessage);
        }

        let (room_id, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let mut guard = room.lock().await;
        let author = guard
            .member(connection_id)
            .map(|m| m.identity.clone())
            .ok_or(RoomActionError::NotInRoom)?;

        let limit = self.config.store_timeout;
        let parent = with_timeout(limit, self.chat_store.get_message(&room_id, &parent_id))
            .await?
            .filter(|parent| guard.channel(&parent.channel_id).is_some())
            .ok_or_else(|| RoomActionError::ParentNotFound(parent_id.to_string()))?;
        if parent.is_reply() {
            return Err(RoomActionError::Validation(
                "Replies cannot be nested".to_string(),
            ));
        }

        let reply = Message {
            id: MessageId::generate(),
            channel_id: parent.channel_id.clone(),
            author_id: author.user_id,
            author_name: author.display_name,
            text,
            attachment: None,
            reply_to: Some(parent_id.clone()),
            created_at: Timestamp::new(self.clock.now_millis()),
        };

        let replies = with_timeout(limit, async {
            self.chat_store.save_message(&room_id, &reply).await?;
            let thread = self.chat_store.thread(&parent_id).await?;
            resolve_views(self.chat_store.as_ref(), thread).await
        })
        .await
        .inspect_err(|e| {
            tracing::error!(room_id = %room_id, parent_id = %parent_id, "Failed to persist reply: {}", e);
        })?;

        guard.set_open_thread(connection_id, Some(parent_id.clone()))?;

        let count = replies.len();
        let view = replies
            .iter()
            .find(|v| v.message.id == reply.id)
            .cloned()
            .unwrap_or_else(|| MessageView::fresh(reply));

        broadcast(
            self.message_pusher.as_ref(),
            guard.thread_viewers(),
            &RoomEvent::ThreadUpdated {
                parent_id: parent_id.clone(),
                replies,
            },
        )
        .await;
        broadcast(
            self.message_pusher.as_ref(),
            guard.channel_member_ids(&parent.channel_id),
            &RoomEvent::MessageReplyCountChanged {
                message_id: parent_id.clone(),
                count,
            },
        )
        .await;

        tracing::debug!(
            connection_id = %connection_id,
            parent_id = %parent_id,
            count,
            "Reply posted"
        );
        Ok(view)
    }
}
