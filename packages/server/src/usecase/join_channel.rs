//! UseCase: チャンネル参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinChannelUseCase::execute() メソッド
//! - 同じ種類のチャンネルからの自動退出（種類ごとにアクティブなチャンネルは 1 つ）
//! - 参加者本人への channel-users / message-history と、既存メンバーへの user-joined-channel
//!
//! ### なぜこのテストが必要か
//! - voice では channel-users に載ったメンバーにだけ新規参加者がオファーを送る
//!   （新規参加者から発信することで、同時参加時のオファー衝突を避ける）
//! - 履歴の取得に失敗した場合にメンバーシップが変わってはいけない
//!
//! ### どのような状況を想定しているか
//! - 正常系：text / voice への参加、同じ種類のチャンネルへの切り替え
//! - エッジケース：同じチャンネルへの再参加
//! - 異常系：存在しないチャンネル、履歴取得の失敗

use std::sync::Arc;

use crate::{
    config::ServerConfig,
    domain::{
        ChannelId, ChannelJoin, ChannelKind, ChatStore, ConnectionId, ConnectionRepository,
        MessagePusher, PresenceEntry, RoomEvent, RoomRepository,
    },
};

use super::{
    error::RoomActionError,
    support::{broadcast, locate_room, push, resolve_views, with_timeout},
};

/// チャンネル参加のユースケース
pub struct JoinChannelUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    message_pusher: Arc<dyn MessagePusher>,
    config: ServerConfig,
}

impl JoinChannelUseCase {
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

    /// チャンネルに参加する
    ///
    /// 通知の順序:
    /// 1. 同じ種類のチャンネルから抜けた場合、ルームの他のメンバーへ user-left-channel
    /// 2. 本人へ channel-users（参加前からいたメンバー）
    /// 3. 既存メンバーへ user-joined-channel
    /// 4. text の場合、本人へ message-history
    /// 5. ルーム全体へ channels-updated
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        channel_id: ChannelId,
    ) -> Result<ChannelJoin, RoomActionError> {
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
        let kind = guard
            .channel(&channel_id)
            .map(|c| c.kind())
            .ok_or_else(|| RoomActionError::ChannelNotFound(channel_id.to_string()))?;

        // メンバーシップを変える前に履歴を取得する
        let history = if kind == ChannelKind::Text {
            let history = with_timeout(self.config.store_timeout, async {
                let messages = self
                    .chat_store
                    .recent_messages(&room_id, &channel_id, self.config.history_limit)
                    .await?;
                resolve_views(self.chat_store.as_ref(), messages).await
            })
            .await
            .inspect_err(|e| {
                tracing::error!(room_id = %room_id, channel_id = %channel_id, "Failed to load history: {}", e);
            })?;
            Some(history)
        } else {
            None
        };

        let join = guard.join_channel(connection_id, &channel_id)?;
        let pusher = self.message_pusher.as_ref();

        if let Some(left) = &join.left {
            broadcast(
                pusher,
                guard.member_ids_except(connection_id),
                &RoomEvent::UserLeftChannel {
                    connection_id: connection_id.clone(),
                    channel_id: left.clone(),
                },
            )
            .await;
        }

        let users: Vec<PresenceEntry> = join
            .others
            .iter()
            .filter_map(|id| guard.member(id))
            .map(PresenceEntry::from)
            .collect();
        push(
            pusher,
            connection_id,
            &RoomEvent::ChannelUsers {
                channel_id: channel_id.clone(),
                users,
            },
        )
        .await;

        if !join.already_member
            && let Some(me) = guard.member(connection_id)
        {
            broadcast(
                pusher,
                join.others.clone(),
                &RoomEvent::UserJoinedChannel {
                    user: PresenceEntry::from(me),
                    channel_id: channel_id.clone(),
                },
            )
            .await;
        }

        if let Some(messages) = history {
            push(
                pusher,
                connection_id,
                &RoomEvent::MessageHistory {
                    channel_id: channel_id.clone(),
                    messages,
                },
            )
            .await;
        }

        broadcast(
            pusher,
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
            kind = %kind,
            "Joined channel"
        );
        Ok(join)
    }
}
