//! UseCase: ルーム退出処理
//!
//! 明示的な leave-room と切断の両方で使われる、1 つの接続の後片付け。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - LeaveRoomUseCase::execute() メソッド
//! - 参加中のチャンネルからの退出、プレゼンスからの削除、空になったルームの除去
//!
//! ### なぜこのテストが必要か
//! - 退出の通知が欠けると、他のクライアントに幽霊メンバーが残り続ける
//! - voice の相手はこの通知でピア接続を閉じる
//!
//! ### どのような状況を想定しているか
//! - 正常系：text と voice の両方に参加中の接続の退出
//! - エッジケース：最後のメンバーの退出（ルームの除去）
//! - エッジケース：ルームに参加していない接続

use std::sync::Arc;

use crate::domain::{
    ConnectionId, ConnectionRepository, Departure, MessagePusher, RoomEvent, RoomRepository,
};

use super::support::broadcast;

/// ルーム退出のユースケース
pub struct LeaveRoomUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl LeaveRoomUseCase {
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

    /// 接続をルームから退出させる
    ///
    /// ルームのロックを保持したまま、チャンネルからの退出とプレゼンスからの削除を一度に行います。
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - 退出したメンバーと、抜けたチャンネル
    /// * `None` - ルームに参加していなかった
    pub async fn execute(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let record = self.connection_repository.get(connection_id).await?;
        let room_id = record.room_id?;

        let Some(room) = self.room_repository.find(&room_id).await else {
            self.clear_room(connection_id).await;
            return None;
        };
        let mut guard = room.lock().await;
        // メンバーを外すまではルームへの参照を残す。ロック待ちで中断されても切断時にルームを辿れる
        let departure = guard.remove_member(connection_id);
        self.clear_room(connection_id).await;
        let departure = departure?;

        let remaining = guard.member_ids();
        for channel_id in &departure.left_channels {
            broadcast(
                self.message_pusher.as_ref(),
                remaining.clone(),
                &RoomEvent::UserLeftChannel {
                    connection_id: connection_id.clone(),
                    channel_id: channel_id.clone(),
                },
            )
            .await;
        }
        broadcast(
            self.message_pusher.as_ref(),
            remaining.clone(),
            &RoomEvent::UserLeftRoom {
                connection_id: connection_id.clone(),
                user_id: departure.member.identity.user_id.clone(),
                display_name: departure.member.identity.display_name.clone(),
            },
        )
        .await;

        let empty = guard.is_empty();
        if !empty {
            broadcast(
                self.message_pusher.as_ref(),
                remaining,
                &RoomEvent::ChannelsUpdated {
                    channels: guard.channel_summaries(),
                },
            )
            .await;
        }
        drop(guard);

        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            left_channels = departure.left_channels.len(),
            "Left room"
        );

        if empty && self.room_repository.remove_if_empty(&room_id).await {
            tracing::info!(room_id = %room_id, "Room is empty, evicted");
        }

        Some(departure)
    }

    async fn clear_room(&self, connection_id: &ConnectionId) {
        if let Err(e) = self
            .connection_repository
            .set_room(connection_id, None)
            .await
        {
            tracing::debug!(connection_id = %connection_id, "Connection already unregistered: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::test_support::{TestContext, channel, room};

    #[tokio::test]
    async fn test_leave_emits_channel_departures_then_room_departure() {
        // テスト項目: text と voice に参加中の接続が退出すると、両方の user-left-channel と user-left-room が届く
        // given (前提条件):
        let ctx = TestContext::new();
        let alice = ctx.join("alice", "lobby").await;
        let bob = ctx.join("bob", "lobby").await;
        ctx.join_channel.execute(&alice, channel("general")).await.unwrap();
        ctx.join_channel.execute(&alice, channel("voice-1")).await.unwrap();
        ctx.pusher.clear();

        // when (操作):
        let departure = ctx.leave_room.execute(&alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            departure.left_channels,
            vec![channel("general"), channel("voice-1")]
        );
        assert_eq!(
            ctx.pusher.events_for(&bob)[..2],
            [
                RoomEvent::UserLeftChannel {
                    connection_id: alice.clone(),
                    channel_id: channel("general"),
                },
                RoomEvent::UserLeftChannel {
                    connection_id: alice.clone(),
                    channel_id: channel("voice-1"),
                },
            ]
        );
        assert_eq!(
            ctx.pusher.names_for(&bob)[2..],
            ["user-left-room", "channels-updated"]
        );
        let lobby = ctx.rooms.find(&room("lobby")).await.unwrap();
        let guard = lobby.lock().await;
        assert!(guard.member(&alice).is_none());
        assert!(guard.channel_summaries().iter().all(|c| c.member_count == 0));
    }

    #[tokio::test]
    async fn test_last_member_evicts_room() {
        // テスト項目: 最後のメンバーが退出するとルームが除去される
        // given (前提条件):
        let ctx = TestContext::new();
        let alice = ctx.join("alice", "lobby").await;

        // when (操作):
        let departure = ctx.leave_room.execute(&alice).await;

        // then (期待する結果):
        assert!(departure.is_some());
        assert!(ctx.rooms.find(&room("lobby")).await.is_none());
        assert_eq!(ctx.connections.get(&alice).await.unwrap().room_id, None);
    }

    #[tokio::test]
    async fn test_history_survives_eviction() {
        // テスト項目: ルームが除去されても、再参加時に永続化済みの履歴とチャンネルが復元される
        // given (前提条件):
        let ctx = TestContext::new();
        let alice = ctx.join("alice", "lobby").await;
        ctx.create_channel
            .execute(&alice, "lounge", crate::domain::ChannelKind::Text)
            .await
            .unwrap();
        ctx.join_channel.execute(&alice, channel("lounge")).await.unwrap();
        ctx.send_message
            .execute(&alice, "still here".to_string(), None)
            .await
            .unwrap();
        ctx.leave_room.execute(&alice).await;
        assert!(ctx.rooms.find(&room("lobby")).await.is_none());

        // when (操作):
        let snapshot = ctx.join_room.execute(&alice, room("lobby"), None).await.unwrap();
        ctx.pusher.clear();
        ctx.join_channel.execute(&alice, channel("lounge")).await.unwrap();

        // then (期待する結果):
        assert!(snapshot.channels.iter().any(|c| c.id == channel("lounge")));
        let history = ctx
            .pusher
            .events_for(&alice)
            .into_iter()
            .find_map(|e| match e {
                RoomEvent::MessageHistory { messages, .. } => Some(messages),
                _ => None,
            })
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message.text, "still here");
    }

    #[tokio::test]
    async fn test_leave_without_room() {
        // テスト項目: ルームに参加していない接続の退出は何もしない
        // given (前提条件):
        let ctx = TestContext::new();
        let alice = ctx.connect_user("alice").await;
        ctx.pusher.clear();

        // when (操作):
        let departure = ctx.leave_room.execute(&alice).await;

        // then (期待する結果):
        assert!(departure.is_none());
        assert!(ctx.pusher.is_empty());
    }
}
