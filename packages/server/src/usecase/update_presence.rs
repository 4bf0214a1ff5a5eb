//! UseCase: プレゼンス・タイピング通知
//!
//! 永続化しない一時的なイベント。status-change はルーム全体、typing はチャンネルのメンバーに送る。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - UpdatePresenceUseCase の各メソッドの配信範囲
//!
//! ### なぜこのテストが必要か
//! - タイピング通知が送信者本人に返ると、自分の入力中表示が出てしまう
//! - ステータスは本人を含むルーム全体で一致している必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：ステータス変更、ミュート、タイピング開始・終了
//! - 異常系：存在しないチャンネルへのタイピング、ルーム未参加

use std::sync::Arc;

use crate::domain::{
    ChannelId, ConnectionId, ConnectionRepository, MessagePusher, PresenceStatus, RoomEvent,
    RoomRepository,
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room},
};

/// プレゼンス・タイピング通知のユースケース
pub struct UpdatePresenceUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl UpdatePresenceUseCase {
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

    /// ステータスを変更し、本人を含むルーム全体に user-status-update を送る
    ///
    /// ルームに参加していない接続は、レジストリ上のステータスだけを更新する。
    pub async fn change_status(
        &self,
        connection_id: &ConnectionId,
        status: PresenceStatus,
    ) -> Result<(), RoomActionError> {
        self.connection_repository
            .set_status(connection_id, status)
            .await
            .map_err(|_| RoomActionError::NotInRoom)?;

        let (_, room) = match locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await
        {
            Ok(found) => found,
            Err(RoomActionError::NotInRoom) => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut guard = room.lock().await;
        guard.set_status(connection_id, status)?;

        broadcast(
            self.message_pusher.as_ref(),
            guard.member_ids(),
            &RoomEvent::UserStatusUpdate {
                connection_id: connection_id.clone(),
                status,
            },
        )
        .await;
        tracing::debug!(connection_id = %connection_id, status = %status, "Status changed");
        Ok(())
    }

    /// ミュート状態をルームの他のメンバーに伝える
    pub async fn set_muted(
        &self,
        connection_id: &ConnectionId,
        muted: bool,
    ) -> Result<(), RoomActionError> {
        let (_, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let guard = room.lock().await;
        if guard.member(connection_id).is_none() {
            return Err(RoomActionError::NotInRoom);
        }
        broadcast(
            self.message_pusher.as_ref(),
            guard.member_ids_except(connection_id),
            &RoomEvent::UserMuteState {
                connection_id: connection_id.clone(),
                muted,
            },
        )
        .await;
        Ok(())
    }

    pub async fn start_typing(
        &self,
        connection_id: &ConnectionId,
        channel_id: ChannelId,
    ) -> Result<(), RoomActionError> {
        let targets = self.typing_targets(connection_id, &channel_id).await?;
        let display_name = self
            .connection_repository
            .get(connection_id)
            .await
            .map(|record| record.identity.display_name)
            .ok_or(RoomActionError::NotInRoom)?;
        broadcast(
            self.message_pusher.as_ref(),
            targets,
            &RoomEvent::UserTyping {
                connection_id: connection_id.clone(),
                display_name,
                channel_id,
            },
        )
        .await;
        Ok(())
    }

    pub async fn stop_typing(
        &self,
        connection_id: &ConnectionId,
        channel_id: ChannelId,
    ) -> Result<(), RoomActionError> {
        let targets = self.typing_targets(connection_id, &channel_id).await?;
        broadcast(
            self.message_pusher.as_ref(),
            targets,
            &RoomEvent::UserStoppedTyping {
                connection_id: connection_id.clone(),
                channel_id,
            },
        )
        .await;
        Ok(())
    }

    /// チャンネルのメンバーから送信者を除いたもの
    async fn typing_targets(
        &self,
        connection_id: &ConnectionId,
        channel_id: &ChannelId,
    ) -> Result<Vec<ConnectionId>, RoomActionError> {
        let (_, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let guard = room.lock().await;
        let channel = guard
            .channel(channel_id)
            .ok_or_else(|| RoomActionError::ChannelNotFound(channel_id.to_string()))?;
        Ok(channel
            .members()
            .iter()
            .filter(|id| *id != connection_id)
            .cloned()
            .collect())
    }
}
