//! Domain 層
//!
//! ルーム・チャンネル・プレゼンスのルールと、外部コラボレーターへのインターフェースを定義します。

pub mod auth;
pub mod entity;
pub mod error;
pub mod event;
pub mod message_pusher;
pub mod repository;
pub mod value_object;

pub use auth::{Credentials, IdentityVerifier, VerifiedIdentity};
pub use entity::{
    Attachment, Channel, ChannelDefinition, ChannelJoin, ChannelKind, ChannelSummary,
    ConnectionRecord, DEFAULT_ATTACHMENT_MIME, DEFAULT_ATTACHMENT_NAME, Departure, Identity,
    Member, Message, MessageView, PresenceEntry, PresenceStatus, RawAttachment, ReactionMap,
    ReactionSummary, Room, RoomSnapshot, RoomSummary,
};
pub use error::{
    AuthError, MessagePushError, RepositoryError, RoomError, StoreError, ValueObjectError,
};
pub use event::{RoomEvent, SignalKind};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use repository::{ChatStore, ConnectionRepository, RoomRepository};
pub use value_object::{
    ChannelId, ConnectionId, DisplayName, Emoji, MessageId, RoomId, Timestamp, UserId,
};

#[cfg(test)]
pub use repository::MockChatStore;
