//! UseCase: ルーム参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - ルームの遅延作成と、永続化済みチャンネル定義からの初期化
//! - 参加者本人への room-info と、他のメンバーへの user-joined-room
//!
//! ### なぜこのテストが必要か
//! - 参加直後のクライアントは room-info だけで画面を描画する
//! - 初期化時の永続化失敗でルームが中途半端な状態にならないことを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：最初の参加者（既定チャンネルの作成）と 2 人目以降の参加
//! - 正常系：別のルームへの移動（前のルームから退出してから参加）
//! - 異常系：チャンネル定義の取得失敗

use std::sync::Arc;

use tsudoi_shared::time::Clock;

use crate::{
    config::ServerConfig,
    domain::{
        ChannelDefinition, ChatStore, ConnectionId, ConnectionRepository, DisplayName, Member,
        MessagePusher, PresenceEntry, Room, RoomEvent, RoomId, RoomRepository, RoomSnapshot,
        Timestamp,
    },
};

use super::{
    error::RoomActionError,
    leave_room::LeaveRoomUseCase,
    support::with_timeout,
};

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    room_repository: Arc<dyn RoomRepository>,
    connection_repository: Arc<dyn ConnectionRepository>,
    chat_store: Arc<dyn ChatStore>,
    message_pusher: Arc<dyn MessagePusher>,
    leave_room: Arc<LeaveRoomUseCase>,
    clock: Arc<dyn Clock>,
    config: ServerConfig,
}

impl JoinRoomUseCase {
    pub fn new(
        room_repository: Arc<dyn RoomRepository>,
        connection_repository: Arc<dyn ConnectionRepository>,
        chat_store: Arc<dyn ChatStore>,
        message_pusher: Arc<dyn MessagePusher>,
        leave_room: Arc<LeaveRoomUseCase>,
        clock: Arc<dyn Clock>,
        config: ServerConfig,
    ) -> Self {
        Self {
            room_repository,
            connection_repository,
            chat_store,
            message_pusher,
            leave_room,
            clock,
            config,
        }
    }

    /// ルームに参加する
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 参加する接続
    /// * `room_id` - 参加先のルーム
    /// * `display_name` - 表示名の上書き（空なら接続時の表示名を使う）
    ///
    /// # Returns
    ///
    /// * `Ok(RoomSnapshot)` - 参加後のチャンネル一覧とプレゼンス一覧
    /// * `Err(RoomActionError)` - 参加失敗（メモリ上の状態は変更されない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
        display_name: Option<String>,
    ) -> Result<RoomSnapshot, RoomActionError> {
        let record = self
            .connection_repository
            .get(connection_id)
            .await
            .ok_or(RoomActionError::NotInRoom)?;

        if let Some(current) = &record.room_id {
            if current == &room_id {
                return self.resend_room_info(connection_id, &room_id).await;
            }
            // 別のルームへ移る前に、今のルームから退出する
            self.leave_room.execute(connection_id).await;
        }

        let mut identity = record.identity.clone();
        if let Some(name) = display_name.and_then(|name| DisplayName::new(name).ok()) {
            identity.display_name = name;
        }

        let mut guard = loop {
            let guard = self
                .room_repository
                .get_or_create(&room_id)
                .await
                .lock_owned()
                .await;
            // 除去済みのルームを掴んだ場合は作り直す
            if !guard.is_evicted() {
                break guard;
            }
        };

        if !guard.is_bootstrapped() {
            if let Err(e) = self.bootstrap(&mut guard).await {
                tracing::error!(room_id = %room_id, "Failed to bootstrap room: {}", e);
                let empty = guard.is_empty();
                drop(guard);
                if empty {
                    self.room_repository.remove_if_empty(&room_id).await;
                }
                return Err(e.into());
            }
        }

        // メンバー追加より先にルームを記録する。追加前に中断されても退出処理が空振りするだけで済む
        if let Err(e) = self
            .connection_repository
            .set_room(connection_id, Some(room_id.clone()))
            .await
        {
            // 参加中に切断された場合
            tracing::warn!(connection_id = %connection_id, "Connection vanished while joining: {}", e);
            let empty = guard.is_empty();
            drop(guard);
            if empty {
                self.room_repository.remove_if_empty(&room_id).await;
            }
            return Err(RoomActionError::NotInRoom);
        }

        let member = Member::new(
            connection_id.clone(),
            identity.clone(),
            Timestamp::new(self.clock.now_millis()),
        );
        let entry = PresenceEntry::from(&member);
        if let Err(e) = guard.add_member(member) {
            if let Err(e) = self.connection_repository.set_room(connection_id, None).await {
                tracing::debug!(connection_id = %connection_id, "Connection already unregistered: {}", e);
            }
            return Err(e.into());
        }
        if let Err(e) = self
            .connection_repository
            .set_display_name(connection_id, identity.display_name.clone())
            .await
        {
            tracing::warn!(connection_id = %connection_id, "Failed to update display name: {}", e);
        }

        let snapshot = guard.snapshot();
        let others = guard.member_ids_except(connection_id);

        self.push(connection_id, &Self::room_info(&snapshot)).await;
        if let Err(e) = self
            .message_pusher
            .broadcast(others, &RoomEvent::UserJoinedRoom { user: entry })
            .await
        {
            tracing::warn!("Failed to broadcast user-joined-room: {}", e);
        }

        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            members = snapshot.users.len(),
            "Joined room"
        );
        Ok(snapshot)
    }

    /// 永続化済みのチャンネル定義でルームを初期化する
    ///
    /// 定義が 1 つも無ければ既定のチャンネルを永続化してから使う。
    async fn bootstrap(&self, room: &mut Room) -> Result<(), crate::domain::StoreError> {
        let limit = self.config.store_timeout;
        let mut definitions =
            with_timeout(limit, self.chat_store.channel_definitions(&room.id)).await?;

        if definitions.is_empty() {
            for (name, kind) in &self.config.default_channels {
                let Ok(definition) = ChannelDefinition::from_name(name, *kind) else {
                    tracing::warn!("Skipping invalid default channel name '{}'", name);
                    continue;
                };
                with_timeout(limit, self.chat_store.create_channel(&room.id, &definition))
                    .await?;
                definitions.push(definition);
            }
        }

        room.seed_channels(definitions);
        tracing::debug!(room_id = %room.id, channels = room.channels().len(), "Room bootstrapped");
        Ok(())
    }

    async fn resend_room_info(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<RoomSnapshot, RoomActionError> {
        let room = self
            .room_repository
            .find(room_id)
            .await
            .ok_or(RoomActionError::NotInRoom)?;
        let snapshot = room.lock().await.snapshot();
        self.push(connection_id, &Self::room_info(&snapshot)).await;
        Ok(snapshot)
    }

    fn room_info(snapshot: &RoomSnapshot) -> RoomEvent {
        RoomEvent::RoomInfo {
            room_id: snapshot.room_id.clone(),
            channels: snapshot.channels.clone(),
            users: snapshot.users.clone(),
        }
    }

    async fn push(&self, connection_id: &ConnectionId, event: &RoomEvent) {
        if let Err(e) = self.message_pusher.push_to(connection_id, event).await {
            tracing::warn!(connection_id = %connection_id, "Failed to push {}: {}", event.name(), e);
        }
    }
}
