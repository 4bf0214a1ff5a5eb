//! UseCase: チャンネル作成処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateChannelUseCase::execute() メソッド
//! - 名前の正規化、重複チェック、永続化してからのメモリ更新
//!
//! ### なぜこのテストが必要か
//! - 永続化に失敗したチャンネルがメモリ上にだけ存在すると、再起動後に消える
//! - 正規化後の ID が衝突すると、別名のチャンネルが同じ ID で上書きされてしまう
//!
//! ### どのような状況を想定しているか
//! - 正常系：作成と channels-updated のブロードキャスト
//! - 異常系：重複した名前、永続化の失敗・タイムアウト

use std::sync::Arc;

use crate::{
    config::ServerConfig,
    domain::{
        ChannelDefinition, ChannelKind, ChannelSummary, ChatStore, ConnectionId,
        ConnectionRepository, MessagePusher, RoomEvent, RoomRepository,
    },
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room, with_timeout},
};

/// チャンネル作成のユースケース
pub struct CreateChannelUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    message_pusher: Arc<dyn MessagePusher>,
    config: ServerConfig,
}

impl CreateChannelUseCase {
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

    /// チャンネルを作成する
    ///
    /// # Returns
    ///
    /// * `Ok(ChannelSummary)` - 作成されたチャンネル
    /// * `Err(RoomActionError::DuplicateChannel)` - 正規化後の ID がルーム内の既存チャンネルと衝突
    /// * `Err(RoomActionError::Persistence)` - 永続化の失敗（メモリ上の状態は変更されない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelSummary, RoomActionError> {
        let definition = ChannelDefinition::from_name(name, kind)?;

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
        if guard.channel(&definition.id).is_some() {
            return Err(RoomActionError::DuplicateChannel(definition.id.into_string()));
        }

        with_timeout(
            self.config.store_timeout,
            self.chat_store.create_channel(&room_id, &definition),
        )
        .await
        .inspect_err(|e| {
            tracing::error!(room_id = %room_id, channel_id = %definition.id, "Failed to persist channel: {}", e);
        })?;

        let channel_id = definition.id.clone();
        guard.add_channel(definition)?;
        let summary = guard
            .channel(&channel_id)
            .map(|c| c.summary())
            .ok_or_else(|| RoomActionError::ChannelNotFound(channel_id.to_string()))?;

        broadcast(
            self.message_pusher.as_ref(),
            guard.member_ids(),
            &RoomEvent::ChannelsUpdated {
                channels: guard.channel_summaries(),
            },
        )
        .await;

        tracing::info!(
            room_id = %room_id,
            channel_id = %channel_id,
            kind = %summary.kind,
            "Channel created"
        );
        Ok(summary)
    }
}
