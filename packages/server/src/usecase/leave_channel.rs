//! UseCase: チャンネル退出処理

use std::sync::Arc;

use crate::domain::{
    ChannelId, ConnectionId, ConnectionRepository, MessagePusher, RoomEvent, RoomRepository,
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room},
};

/// チャンネル退出のユースケース
pub struct LeaveChannelUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl LeaveChannelUseCase {
    pub fn new(
        room_repository: Arc<dyn RoomRepository>,
        connection_repository: Arc<dyn ConnectionRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            room_repository,
            connection_repository,
            message_pusher,
        }
    }

    /// チャンネルから抜ける（冪等）
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - 退出した（ルームの他のメンバーに user-left-channel と channels-updated を送信）
    /// * `Ok(false)` - 参加していなかった（何も送信しない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        channel_id: ChannelId,
    ) -> Result<bool, RoomActionError> {
        let (room_id, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let mut guard = room.lock().await;
        if !guard.leave_channel(connection_id, &channel_id) {
            return Ok(false);
        }

        broadcast(
            self.message_pusher.as_ref(),
            guard.member_ids_except(connection_id),
            &RoomEvent::UserLeftChannel {
                connection_id: connection_id.clone(),
                channel_id: channel_id.clone(),
            },
        )
        .await;
        broadcast(
            self.message_pusher.as_ref(),
            guard.member_ids(),
            &RoomEvent::ChannelsUpdated {
                channels: guard.channel_summaries(),
            },
        )
        .await;

        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            channel_id = %channel_id,
            "Left channel"
        );
        Ok(true)
    }
}
