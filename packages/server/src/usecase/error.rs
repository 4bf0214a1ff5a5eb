//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{RoomError, StoreError, ValueObjectError};

/// 接続処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection '{0}' is already registered")]
    DuplicateConnection(String),
}

/// ルーム内の操作（チャンネル・メッセージ・リアクション・シグナリングなど）のエラー
///
/// 呼び出し元の接続にのみ `channel-error` として通知するか、黙って捨てます。
/// ブロードキャストされることはありません。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomActionError {
    #[error("connection is not in a room")]
    NotInRoom,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("message is empty")]
    EmptyMessage,
    #[error("no active text channel")]
    NoActiveTextChannel,
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),
    #[error("parent message '{0}' not found")]
    ParentNotFound(String),
    #[error("message '{0}' not found")]
    MessageNotFound(String),
    #[error("signal target '{0}' not found")]
    SignalTargetNotFound(String),
    #[error("channel '{0}' already exists")]
    DuplicateChannel(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl RoomActionError {
    /// `channel-error{message}` として返す文言
    pub fn client_message(&self) -> String {
        match self {
            Self::NotInRoom => "Join a room first".to_string(),
            Self::Validation(reason) => reason.clone(),
            Self::EmptyMessage => "Message is empty".to_string(),
            Self::NoActiveTextChannel => "Join a text channel first".to_string(),
            Self::ChannelNotFound(_) => "Channel not found".to_string(),
            Self::ParentNotFound(_) => "Parent message not found".to_string(),
            Self::MessageNotFound(_) => "Message not found".to_string(),
            Self::SignalTargetNotFound(_) => "Peer not found".to_string(),
            Self::DuplicateChannel(_) => "Channel already exists".to_string(),
            Self::Persistence(_) => "Request failed, please retry".to_string(),
        }
    }

    /// 呼び出し元にも通知せず捨てるべきエラーか
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage | Self::NoActiveTextChannel | Self::SignalTargetNotFound(_)
        )
    }
}

impl From<ValueObjectError> for RoomActionError {
    fn from(e: ValueObjectError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<RoomError> for RoomActionError {
    fn from(e: RoomError) -> Self {
        match e {
            RoomError::ChannelNotFound(id) => Self::ChannelNotFound(id),
            RoomError::DuplicateChannel(id) => Self::DuplicateChannel(id),
            RoomError::MemberNotFound(_) => Self::NotInRoom,
            RoomError::DuplicateMember(id) => {
                Self::Validation(format!("connection '{}' is already in the room", id))
            }
        }
    }
}

/// ルーム詳細取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("room not found")]
    RoomNotFound,
}
