//! クライアントへ通知するイベント
//!
//! UseCase 層はこの型でイベントを組み立て、MessagePusher がワイヤーフォーマットに変換して送信します。

use serde_json::Value;

use super::{
    entity::{ChannelSummary, MessageView, PresenceEntry, PresenceStatus, ReactionMap},
    value_object::{ChannelId, ConnectionId, DisplayName, MessageId, RoomId, UserId},
};

/// シグナリングメッセージの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// サーバーからクライアントへのイベント
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// 接続直後に自分の接続 ID を通知
    Connected {
        connection_id: ConnectionId,
        user_id: UserId,
        display_name: DisplayName,
    },
    /// ルーム参加時のスナップショット（参加者本人のみ）
    RoomInfo {
        room_id: RoomId,
        channels: Vec<ChannelSummary>,
        users: Vec<PresenceEntry>,
    },
    ChannelsUpdated {
        channels: Vec<ChannelSummary>,
    },
    UserJoinedRoom {
        user: PresenceEntry,
    },
    UserLeftRoom {
        connection_id: ConnectionId,
        user_id: UserId,
        display_name: DisplayName,
    },
    UserStatusUpdate {
        connection_id: ConnectionId,
        status: PresenceStatus,
    },
    UserMuteState {
        connection_id: ConnectionId,
        muted: bool,
    },
    /// チャンネル参加時、すでにいるメンバーの一覧（参加者本人のみ）
    ChannelUsers {
        channel_id: ChannelId,
        users: Vec<PresenceEntry>,
    },
    UserJoinedChannel {
        user: PresenceEntry,
        channel_id: ChannelId,
    },
    UserLeftChannel {
        connection_id: ConnectionId,
        channel_id: ChannelId,
    },
    MessageHistory {
        channel_id: ChannelId,
        messages: Vec<MessageView>,
    },
    ChatMessage(MessageView),
    /// スレッドの返信一覧（差分ではなく全件）
    ThreadUpdated {
        parent_id: MessageId,
        replies: Vec<MessageView>,
    },
    ThreadHistory {
        parent_id: MessageId,
        replies: Vec<MessageView>,
    },
    MessageReplyCountChanged {
        message_id: MessageId,
        count: usize,
    },
    ReactionUpdate {
        message_id: MessageId,
        channel_id: ChannelId,
        reactions: ReactionMap,
    },
    UserTyping {
        connection_id: ConnectionId,
        display_name: DisplayName,
        channel_id: ChannelId,
    },
    UserStoppedTyping {
        connection_id: ConnectionId,
        channel_id: ChannelId,
    },
    /// 宛先接続にのみ届くシグナリングメッセージ（ペイロードは中身を見ずに中継）
    Signal {
        kind: SignalKind,
        from: ConnectionId,
        display_name: DisplayName,
        payload: Value,
    },
    ChannelError {
        message: String,
    },
}

impl RoomEvent {
    /// ログ出力用のイベント名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::RoomInfo { .. } => "room-info",
            Self::ChannelsUpdated { .. } => "channels-updated",
            Self::UserJoinedRoom { .. } => "user-joined-room",
            Self::UserLeftRoom { .. } => "user-left-room",
            Self::UserStatusUpdate { .. } => "user-status-update",
            Self::UserMuteState { .. } => "user-mute-state",
            Self::ChannelUsers { .. } => "channel-users",
            Self::UserJoinedChannel { .. } => "user-joined-channel",
            Self::UserLeftChannel { .. } => "user-left-channel",
            Self::MessageHistory { .. } => "message-history",
            Self::ChatMessage(_) => "chat-message",
            Self::ThreadUpdated { .. } => "thread-updated",
            Self::ThreadHistory { .. } => "thread-history",
            Self::MessageReplyCountChanged { .. } => "message-reply-count-changed",
            Self::ReactionUpdate { .. } => "reaction-update",
            Self::UserTyping { .. } => "user-typing",
            Self::UserStoppedTyping { .. } => "user-stopped-typing",
            Self::Signal { kind, .. } => match kind {
                SignalKind::Offer => "signal-offer",
                SignalKind::Answer => "signal-answer",
                SignalKind::IceCandidate => "signal-ice",
            },
            Self::ChannelError { .. } => "channel-error",
        }
    }
}
