//! ドメイン層のエラー型

use thiserror::Error;

/// Value Object の生成に失敗した場合のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("connection id must not be empty")]
    ConnectionIdEmpty,
    #[error("user id must not be empty")]
    UserIdEmpty,
    #[error("display name must not be empty")]
    DisplayNameEmpty,
    #[error("room id must not be empty")]
    RoomIdEmpty,
    #[error("channel id must not be empty")]
    ChannelIdEmpty,
    #[error("channel name '{0}' does not contain any usable character")]
    ChannelNameInvalid(String),
    #[error("message id must not be empty")]
    MessageIdEmpty,
    #[error("emoji must not be empty")]
    EmojiEmpty,
    #[error("emoji is too long ({0} characters)")]
    EmojiTooLong(usize),
    #[error("invalid status '{0}'")]
    InvalidStatus(String),
    #[error("invalid channel kind '{0}'")]
    InvalidChannelKind(String),
}

/// Room エンティティのルール違反
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),
    #[error("channel '{0}' already exists")]
    DuplicateChannel(String),
    #[error("member '{0}' not found")]
    MemberNotFound(String),
    #[error("member '{0}' is already in the room")]
    DuplicateMember(String),
}

/// Repository 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("connection '{0}' is already registered")]
    DuplicateConnection(String),
    #[error("connection '{0}' not found")]
    ConnectionNotFound(String),
}

/// 永続化コラボレーター（ChatStore）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("record not found: {0}")]
    NotFound(String),
}

/// メッセージ送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// 認証（接続時の身元確認）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing user id")]
    MissingUserId,
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}
