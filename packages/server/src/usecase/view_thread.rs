//! UseCase: スレッドの表示・クローズ

use std::sync::Arc;

use crate::{
    config::ServerConfig,
    domain::{
        ChannelId, ChatStore, ConnectionId, ConnectionRepository, MessageId, MessagePusher,
        MessageView, RoomEvent, RoomRepository,
    },
};

use super::{
    error::RoomActionError,
    support::{locate_room, push, resolve_views, with_timeout},
};

/// スレッド表示のユースケース
pub struct ViewThreadUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    message_pusher: Arc<dyn MessagePusher>,
    config: ServerConfig,
}

impl ViewThreadUseCase {
    pub fn new(
        room_repository: Arc<dyn RoomRepository>,
        connection_repository: Arc<dyn ConnectionRepository>,
        chat_store: Arc<dyn ChatStore>,
        message_pusher: Arc<dyn MessagePusher>,
        config: ServerConfig,
    ) -> Self {
        Self {
            room_repository,
            connection_repository,
            chat_store,
            message_pusher,
            config,
        }
    }

    /// スレッドを開き、返信一覧を thread-history として本人に送る
    ///
    /// 以降、このスレッドへの返信で thread-updated を受け取るようになる。
    pub async fn open(
        &self,
        connection_id: &ConnectionId,
        channel_id: ChannelId,
        parent_id: MessageId,
    ) -> Result<Vec<MessageView>, RoomActionError> {
        let (room_id, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let mut guard = room.lock().await;
        if guard.member(connection_id).is_none() {
            return Err(RoomActionError::NotInRoom);
        }
        if guard.channel(&channel_id).is_none() {
            return Err(RoomActionError::ChannelNotFound(channel_id.into_string()));
        }

        let replies = with_timeout(self.config.store_timeout, async {
            let parent = self.chat_store.get_message(&room_id, &parent_id).await?;
            match parent {
                Some(parent) if parent.channel_id == channel_id => {
                    let thread = self.chat_store.thread(&parent_id).await?;
                    resolve_views(self.chat_store.as_ref(), thread).await.map(Some)
                }
                _ => Ok(None),
            }
        })
        .await
        .inspect_err(|e| {
            tracing::error!(room_id = %room_id, parent_id = %parent_id, "Failed to load thread: {}", e);
        })?
        .ok_or_else(|| RoomActionError::ParentNotFound(parent_id.to_string()))?;

        guard.set_open_thread(connection_id, Some(parent_id.clone()))?;
        push(
            self.message_pusher.as_ref(),
            connection_id,
            &RoomEvent::ThreadHistory {
                parent_id,
                replies: replies.clone(),
            },
        )
        .await;
        Ok(replies)
    }

    /// 開いているスレッドを閉じる（冪等）
    pub async fn close(&self, connection_id: &ConnectionId) -> Result<(), RoomActionError> {
        let (_, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        room.lock().await.set_open_thread(connection_id, None)?;
        Ok(())
    }
}
