//! UseCase: リアクションの追加・削除
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ReactUseCase::add() / remove() メソッド
//! - 集計（絵文字ごとの人数とユーザー一覧）の再計算と reaction-update の配信
//!
//! ### なぜこのテストが必要か
//! - 同じユーザーが同じ絵文字を 2 回押しても 1 人として数える（集合として扱う）
//! - 集計はキャッシュせず永続化先から毎回計算するため、取り消し後も一致する
//!
//! ### どのような状況を想定しているか
//! - 正常系：追加・重複追加・削除
//! - 異常系：存在しないメッセージ、不正な絵文字

use std::sync::Arc;

use crate::{
    config::ServerConfig,
    domain::{
        ChatStore, ConnectionId, ConnectionRepository, Emoji, MessageId, MessagePusher,
        ReactionMap, RoomEvent, RoomRepository,
    },
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room, with_timeout},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReactionOp {
    Add,
    Remove,
}

/// リアクションのユースケース
pub struct ReactUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    message_pusher: Arc<dyn MessagePusher>,
    config: ServerConfig,
}

impl ReactUseCase {
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

    pub async fn add(
        &self,
        connection_id: &ConnectionId,
        message_id: MessageId,
        emoji: Emoji,
    ) -> Result<ReactionMap, RoomActionError> {
        self.apply(connection_id, message_id, emoji, ReactionOp::Add)
            .await
    }

    pub async fn remove(
        &self,
        connection_id: &ConnectionId,
        message_id: MessageId,
        emoji: Emoji,
    ) -> Result<ReactionMap, RoomActionError> {
        self.apply(connection_id, message_id, emoji, ReactionOp::Remove)
            .await
    }

    /// リアクションを反映し、メッセージのチャンネルのメンバーに最新の集計を送る
    async fn apply(
        &self,
        connection_id: &ConnectionId,
        message_id: MessageId,
        emoji: Emoji,
        op: ReactionOp,
    ) -> Result<ReactionMap, RoomActionError> {
        let (room_id, room) = locate_room(
            self.connection_repository.as_ref(),
            self.room_repository.as_ref(),
            connection_id,
        )
        .await?;
        let guard = room.lock().await;
        let user_id = guard
            .member(connection_id)
            .map(|m| m.identity.user_id.clone())
            .ok_or(RoomActionError::NotInRoom)?;

        let limit = self.config.store_timeout;
        let message = with_timeout(limit, self.chat_store.get_message(&room_id, &message_id))
            .await?
            .filter(|message| guard.channel(&message.channel_id).is_some())
            .ok_or_else(|| RoomActionError::MessageNotFound(message_id.to_string()))?;

        let reactions = with_timeout(limit, async {
            match op {
                ReactionOp::Add => {
                    self.chat_store
                        .add_reaction(&message_id, &user_id, &emoji)
                        .await?
                }
                ReactionOp::Remove => {
                    self.chat_store
                        .remove_reaction(&message_id, &user_id, &emoji)
                        .await?
                }
            }
            self.chat_store.reaction_aggregate(&message_id).await
        })
        .await
        .inspect_err(|e| {
            tracing::error!(room_id = %room_id, message_id = %message_id, "Failed to update reaction: {}", e);
        })?;

        broadcast(
            self.message_pusher.as_ref(),
            guard.channel_member_ids(&message.channel_id),
            &RoomEvent::ReactionUpdate {
                message_id: message_id.clone(),
                channel_id: message.channel_id.clone(),
                reactions: reactions.clone(),
            },
        )
        .await;

        tracing::debug!(
            connection_id = %connection_id,
            message_id = %message_id,
            emoji = %emoji,
            op = ?op,
            "Reaction applied"
        );
        Ok(reactions)
    }
}
