//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    ChannelDefinition, ChannelId, ConnectionId, ConnectionRecord, DisplayName, Emoji, Message,
    MessageId, PresenceStatus, ReactionMap, RepositoryError, Room, RoomId, StoreError, UserId,
};

/// Room Repository trait
///
/// インメモリのルームテーブル。各ルームは個別の `Mutex` で保護され、
/// メンバーシップを読んでから書き換える操作はそのロックを保持したまま実行します。
///
/// ## 依存性の逆転（DIP）
///
/// - ドメイン層が必要とするインターフェースをドメイン層自身が定義
/// - Infrastructure 層がドメイン層のインターフェースに依存
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// ルームを取得し、無ければ空のルームを作成する（冪等）
    async fn get_or_create(&self, room_id: &RoomId) -> Arc<Mutex<Room>>;

    /// 既存のルームを取得
    async fn find(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>>;

    /// ルームが空であればテーブルから取り除く
    ///
    /// 他の操作がルームのロックを保持している場合は取り除かずに `false` を返します。
    async fn remove_if_empty(&self, room_id: &RoomId) -> bool;

    /// 全てのルームを取得
    async fn list(&self) -> Vec<Arc<Mutex<Room>>>;
}

/// Connection Repository trait
///
/// 生きている接続と、その身元・参加中のルームを対応付けます。
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn register(&self, record: ConnectionRecord) -> Result<(), RepositoryError>;

    async fn get(&self, connection_id: &ConnectionId) -> Option<ConnectionRecord>;

    async fn set_room(
        &self,
        connection_id: &ConnectionId,
        room_id: Option<RoomId>,
    ) -> Result<(), RepositoryError>;

    async fn set_display_name(
        &self,
        connection_id: &ConnectionId,
        display_name: DisplayName,
    ) -> Result<(), RepositoryError>;

    async fn set_status(
        &self,
        connection_id: &ConnectionId,
        status: PresenceStatus,
    ) -> Result<(), RepositoryError>;

    async fn unregister(&self, connection_id: &ConnectionId) -> Option<ConnectionRecord>;

    async fn count(&self) -> usize;
}

/// 永続化コラボレーター
///
/// チャンネル定義・メッセージ・リアクションの保存先。スキーマやエンジンはこの trait の外側の関心事です。
/// 呼び出し側はタイムアウトを付けて呼び出し、失敗時はメモリ上の状態を変更しません。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_channel(
        &self,
        room_id: &RoomId,
        definition: &ChannelDefinition,
    ) -> Result<(), StoreError>;

    async fn channel_definitions(&self, room_id: &RoomId)
    -> Result<Vec<ChannelDefinition>, StoreError>;

    async fn save_message(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError>;

    /// `room_id` のルームに保存されたメッセージを取得する（別のルームのメッセージは `None`）
    async fn get_message(
        &self,
        room_id: &RoomId,
        message_id: &MessageId,
    ) -> Result<Option<Message>, StoreError>;

    /// メインフィードの新しい順に最大 `limit` 件を、古い順に並べて返す（返信は含まない）
    async fn recent_messages(
        &self,
        room_id: &RoomId,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// 親メッセージへの返信を古い順に返す
    async fn thread(&self, parent_id: &MessageId) -> Result<Vec<Message>, StoreError>;

    async fn reply_count(&self, parent_id: &MessageId) -> Result<usize, StoreError>;

    /// リアクションを追加（同じユーザー・絵文字の組は 1 度だけ数える）
    async fn add_reaction(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
        emoji: &Emoji,
    ) -> Result<(), StoreError>;

    /// リアクションを削除（存在しなければ何もしない）
    async fn remove_reaction(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
        emoji: &Emoji,
    ) -> Result<(), StoreError>;

    async fn reaction_aggregate(&self, message_id: &MessageId) -> Result<ReactionMap, StoreError>;
}
