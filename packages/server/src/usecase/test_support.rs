//! UseCase テスト用のフィクスチャ
//!
//! インメモリのリポジトリと、送信したイベントを記録する MessagePusher で全ユースケースを組み立てます。

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tsudoi_shared::time::{Clock, FixedClock};

use crate::{
    config::ServerConfig,
    domain::{
        ChannelDefinition, ChannelId, ChannelKind, ChatStore, ConnectionId, DisplayName, Emoji,
        Message, MessageId, MessagePushError, MessagePusher, PusherChannel, ReactionMap,
        RoomEvent, RoomId, StoreError, UserId, VerifiedIdentity,
    },
    infrastructure::repository::inmemory::{
        InMemoryChatStore, InMemoryConnectionRepository, InMemoryRoomRepository,
    },
};

use super::{
    ConnectParticipantUseCase, CreateChannelUseCase, DisconnectParticipantUseCase,
    GetRoomDetailUseCase, GetRoomsUseCase, JoinChannelUseCase, JoinRoomUseCase,
    LeaveChannelUseCase, LeaveRoomUseCase, PostReplyUseCase, ReactUseCase, RelaySignalUseCase,
    SendMessageUseCase, UpdatePresenceUseCase, ViewThreadUseCase,
};

pub fn room(id: &str) -> RoomId {
    RoomId::new(id.to_string()).unwrap()
}

pub fn channel(id: &str) -> ChannelId {
    ChannelId::new(id.to_string()).unwrap()
}

pub fn default_definitions() -> Vec<ChannelDefinition> {
    vec![
        ChannelDefinition::from_name("general", ChannelKind::Text).unwrap(),
        ChannelDefinition::from_name("voice-1", ChannelKind::Voice).unwrap(),
    ]
}

/// 送信したイベントを接続ごとに記録する MessagePusher
#[derive(Default)]
pub struct RecordingPusher {
    registered: Mutex<HashSet<ConnectionId>>,
    delivered: Mutex<Vec<(ConnectionId, RoomEvent)>>,
}

impl RecordingPusher {
    pub fn events_for(&self, connection_id: &ConnectionId) -> Vec<RoomEvent> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target == connection_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn names_for(&self, connection_id: &ConnectionId) -> Vec<&'static str> {
        self.events_for(connection_id)
            .iter()
            .map(RoomEvent::name)
            .collect()
    }

    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.lock().unwrap().is_empty()
    }

    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.registered.lock().unwrap().contains(connection_id)
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_client(&self, connection_id: ConnectionId, _sender: PusherChannel) {
        self.registered.lock().unwrap().insert(connection_id);
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        self.registered.lock().unwrap().remove(connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &RoomEvent,
    ) -> Result<(), MessagePushError> {
        if !self.is_registered(connection_id) {
            return Err(MessagePushError::ClientNotFound(connection_id.to_string()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((connection_id.clone(), event.clone()));
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        event: &RoomEvent,
    ) -> Result<(), MessagePushError> {
        for target in targets {
            if self.is_registered(&target) {
                self.delivered.lock().unwrap().push((target, event.clone()));
            }
        }
        Ok(())
    }
}

/// チャンネル定義以外の書き込みが終わらない ChatStore（タイムアウトの検証用）
pub struct StallingChatStore;

impl StallingChatStore {
    pub fn new() -> Self {
        Self
    }

    async fn stall() {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

#[async_trait]
impl ChatStore for StallingChatStore {
    async fn create_channel(
        &self,
        _room_id: &RoomId,
        _definition: &ChannelDefinition,
    ) -> Result<(), StoreError> {
        Self::stall().await;
        Ok(())
    }

    async fn channel_definitions(
        &self,
        _room_id: &RoomId,
    ) -> Result<Vec<ChannelDefinition>, StoreError> {
        Ok(default_definitions())
    }

    async fn save_message(&self, _room_id: &RoomId, _message: &Message) -> Result<(), StoreError> {
        Self::stall().await;
        Ok(())
    }

    async fn get_message(
        &self,
        _room_id: &RoomId,
        _message_id: &MessageId,
    ) -> Result<Option<Message>, StoreError> {
        Ok(None)
    }

    async fn recent_messages(
        &self,
        _room_id: &RoomId,
        _channel_id: &ChannelId,
        _limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(Vec::new())
    }

    async fn thread(&self, _parent_id: &MessageId) -> Result<Vec<Message>, StoreError> {
        Ok(Vec::new())
    }

    async fn reply_count(&self, _parent_id: &MessageId) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn add_reaction(
        &self,
        _message_id: &MessageId,
        _user_id: &UserId,
        _emoji: &Emoji,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _message_id: &MessageId,
        _user_id: &UserId,
        _emoji: &Emoji,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn reaction_aggregate(&self, _message_id: &MessageId) -> Result<ReactionMap, StoreError> {
        Ok(ReactionMap::new())
    }
}

/// 全ユースケースを共通のリポジトリで組み立てたもの
pub struct TestContext {
    pub rooms: Arc<InMemoryRoomRepository>,
    pub connections: Arc<InMemoryConnectionRepository>,
    pub store: Arc<dyn ChatStore>,
    pub pusher: Arc<RecordingPusher>,
    pub connect: Arc<ConnectParticipantUseCase>,
    pub leave_room: Arc<LeaveRoomUseCase>,
    pub disconnect: Arc<DisconnectParticipantUseCase>,
    pub join_room: Arc<JoinRoomUseCase>,
    pub create_channel: Arc<CreateChannelUseCase>,
    pub join_channel: Arc<JoinChannelUseCase>,
    pub leave_channel: Arc<LeaveChannelUseCase>,
    pub presence: Arc<UpdatePresenceUseCase>,
    pub send_message: Arc<SendMessageUseCase>,
    pub post_reply: Arc<PostReplyUseCase>,
    pub view_thread: Arc<ViewThreadUseCase>,
    pub react: Arc<ReactUseCase>,
    pub relay: Arc<RelaySignalUseCase>,
    pub get_rooms: Arc<GetRoomsUseCase>,
    pub get_room_detail: Arc<GetRoomDetailUseCase>,
}

impl TestContext {
    /// テスト中の「現在時刻」（2024-01-01T00:00:00Z）
    pub const NOW: i64 = 1_704_067_200_000;

    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryChatStore::new()))
    }

    pub fn with_store(store: Arc<dyn ChatStore>) -> Self {
        Self::with_store_and_config(store, ServerConfig::default())
    }

    pub fn with_store_and_config(store: Arc<dyn ChatStore>, config: ServerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Self::NOW));
        let rooms = Arc::new(InMemoryRoomRepository::new(clock.clone()));
        let connections = Arc::new(InMemoryConnectionRepository::new());
        let pusher = Arc::new(RecordingPusher::default());

        let leave_room = Arc::new(LeaveRoomUseCase::new(
            rooms.clone(),
            connections.clone(),
            pusher.clone(),
        ));

        Self {
            connect: Arc::new(ConnectParticipantUseCase::new(
                connections.clone(),
                pusher.clone(),
                clock.clone(),
            )),
            disconnect: Arc::new(DisconnectParticipantUseCase::new(
                leave_room.clone(),
                connections.clone(),
                pusher.clone(),
            )),
            join_room: Arc::new(JoinRoomUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                leave_room.clone(),
                clock.clone(),
                config.clone(),
            )),
            create_channel: Arc::new(CreateChannelUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                config.clone(),
            )),
            join_channel: Arc::new(JoinChannelUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                config.clone(),
            )),
            leave_channel: Arc::new(LeaveChannelUseCase::new(
                rooms.clone(),
                connections.clone(),
                pusher.clone(),
            )),
            presence: Arc::new(UpdatePresenceUseCase::new(
                rooms.clone(),
                connections.clone(),
                pusher.clone(),
            )),
            send_message: Arc::new(SendMessageUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                clock.clone(),
                config.clone(),
            )),
            post_reply: Arc::new(PostReplyUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                clock.clone(),
                config.clone(),
            )),
            view_thread: Arc::new(ViewThreadUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                config.clone(),
            )),
            react: Arc::new(ReactUseCase::new(
                rooms.clone(),
                connections.clone(),
                store.clone(),
                pusher.clone(),
                config,
            )),
            relay: Arc::new(RelaySignalUseCase::new(connections.clone(), pusher.clone())),
            get_rooms: Arc::new(GetRoomsUseCase::new(rooms.clone())),
            get_room_detail: Arc::new(GetRoomDetailUseCase::new(rooms.clone())),
            leave_room,
            rooms,
            connections,
            store,
            pusher,
        }
    }

    /// 名前をユーザー ID と表示名に使って接続する
    pub async fn connect_user(&self, name: &str) -> ConnectionId {
        let (tx, _rx) = mpsc::unbounded_channel();
        let identity = VerifiedIdentity {
            user_id: UserId::new(name.to_string()).unwrap(),
            display_name: DisplayName::new(name.to_string()).unwrap(),
        };
        self.connect
            .execute(identity, tx)
            .await
            .unwrap()
            .connection_id
    }

    /// 接続してルームに参加する
    pub async fn join(&self, name: &str, room_id: &str) -> ConnectionId {
        let connection_id = self.connect_user(name).await;
        self.join_room
            .execute(&connection_id, room(room_id), None)
            .await
            .unwrap();
        connection_id
    }
}
