//! Shared application state.

use std::sync::Arc;

use tsudoi_shared::time::{Clock, SystemClock};

use crate::{
    config::ServerConfig,
    domain::{ChatStore, IdentityVerifier, MessagePusher},
    infrastructure::{
        auth::QueryIdentityVerifier,
        message_pusher::WebSocketMessagePusher,
        repository::inmemory::{
            InMemoryChatStore, InMemoryConnectionRepository, InMemoryRoomRepository,
        },
    },
    usecase::{
        ConnectParticipantUseCase, CreateChannelUseCase, DisconnectParticipantUseCase,
        GetRoomDetailUseCase, GetRoomsUseCase, JoinChannelUseCase, JoinRoomUseCase,
        LeaveChannelUseCase, LeaveRoomUseCase, PostReplyUseCase, ReactUseCase,
        RelaySignalUseCase, SendMessageUseCase, UpdatePresenceUseCase, ViewThreadUseCase,
    },
};

/// Shared application state
///
/// Holds one instance of every use case; handlers only talk to use cases.
pub struct AppState {
    /// IdentityVerifier（接続時の身元確認）
    pub identity_verifier: Arc<dyn IdentityVerifier>,
    /// MessagePusher（channel-error の送信に使用）
    pub message_pusher: Arc<dyn MessagePusher>,
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    pub join_room_usecase: Arc<JoinRoomUseCase>,
    pub leave_room_usecase: Arc<LeaveRoomUseCase>,
    pub create_channel_usecase: Arc<CreateChannelUseCase>,
    pub join_channel_usecase: Arc<JoinChannelUseCase>,
    pub leave_channel_usecase: Arc<LeaveChannelUseCase>,
    pub update_presence_usecase: Arc<UpdatePresenceUseCase>,
    pub send_message_usecase: Arc<SendMessageUseCase>,
    pub post_reply_usecase: Arc<PostReplyUseCase>,
    pub view_thread_usecase: Arc<ViewThreadUseCase>,
    pub react_usecase: Arc<ReactUseCase>,
    pub relay_signal_usecase: Arc<RelaySignalUseCase>,
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}

impl AppState {
    /// Wire every use case against in-memory repositories and the in-memory chat store.
    pub fn in_memory(config: ServerConfig) -> Self {
        Self::with_store(Arc::new(InMemoryChatStore::new()), config)
    }

    /// Wire every use case against in-memory repositories and the given chat store.
    ///
    /// Dependencies are created in order:
    /// 1. Repositories and chat store
    /// 2. MessagePusher and IdentityVerifier
    /// 3. UseCases
    pub fn with_store(chat_store: Arc<dyn ChatStore>, config: ServerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // 1. Repositories
        let room_repository = Arc::new(InMemoryRoomRepository::new(clock.clone()));
        let connection_repository = Arc::new(InMemoryConnectionRepository::new());

        // 2. MessagePusher (WebSocket implementation) and IdentityVerifier
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let identity_verifier = Arc::new(QueryIdentityVerifier::new());

        // 3. UseCases
        let leave_room_usecase = Arc::new(LeaveRoomUseCase::new(
            room_repository.clone(),
            connection_repository.clone(),
            message_pusher.clone(),
        ));

        Self {
            connect_participant_usecase: Arc::new(ConnectParticipantUseCase::new(
                connection_repository.clone(),
                message_pusher.clone(),
                clock.clone(),
            )),
            disconnect_participant_usecase: Arc::new(DisconnectParticipantUseCase::new(
                leave_room_usecase.clone(),
                connection_repository.clone(),
                message_pusher.clone(),
            )),
            join_room_usecase: Arc::new(JoinRoomUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store.clone(),
                message_pusher.clone(),
                leave_room_usecase.clone(),
                clock.clone(),
                config.clone(),
            )),
            create_channel_usecase: Arc::new(CreateChannelUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store.clone(),
                message_pusher.clone(),
                config.clone(),
            )),
            join_channel_usecase: Arc::new(JoinChannelUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store.clone(),
                message_pusher.clone(),
                config.clone(),
            )),
            leave_channel_usecase: Arc::new(LeaveChannelUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                message_pusher.clone(),
            )),
            update_presence_usecase: Arc::new(UpdatePresenceUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                message_pusher.clone(),
            )),
            send_message_usecase: Arc::new(SendMessageUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store.clone(),
                message_pusher.clone(),
                clock.clone(),
                config.clone(),
            )),
            post_reply_usecase: Arc::new(PostReplyUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store.clone(),
                message_pusher.clone(),
                clock,
                config.clone(),
            )),
            view_thread_usecase: Arc::new(ViewThreadUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store.clone(),
                message_pusher.clone(),
                config.clone(),
            )),
            react_usecase: Arc::new(ReactUseCase::new(
                room_repository.clone(),
                connection_repository.clone(),
                chat_store,
                message_pusher.clone(),
                config,
            )),
            relay_signal_usecase: Arc::new(RelaySignalUseCase::new(
                connection_repository,
                message_pusher.clone(),
            )),
            get_rooms_usecase: Arc::new(GetRoomsUseCase::new(room_repository.clone())),
            get_room_detail_usecase: Arc::new(GetRoomDetailUseCase::new(room_repository)),
            leave_room_usecase,
            identity_verifier,
            message_pusher,
        }
    }
}
