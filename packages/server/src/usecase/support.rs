//! UseCase 間で共有する補助関数

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::domain::{
    ChatStore, ConnectionId, ConnectionRepository, Message, MessagePusher, MessageView, Room,
    RoomEvent, RoomId, RoomRepository, StoreError,
};

use super::error::RoomActionError;

/// 永続化コラボレーターの呼び出しに上限時間を設ける
pub(crate) async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

/// 接続が参加しているルームを探す
pub(crate) async fn locate_room(
    connections: &dyn ConnectionRepository,
    rooms: &dyn RoomRepository,
    connection_id: &ConnectionId,
) -> Result<(RoomId, Arc<Mutex<Room>>), RoomActionError> {
    let record = connections
        .get(connection_id)
        .await
        .ok_or(RoomActionError::NotInRoom)?;
    let room_id = record.room_id.ok_or(RoomActionError::NotInRoom)?;
    let room = rooms
        .find(&room_id)
        .await
        .ok_or(RoomActionError::NotInRoom)?;
    Ok((room_id, room))
}

/// 保存済みメッセージにリアクション集計と返信数を付ける（キャッシュは使わず毎回計算）
pub(crate) async fn resolve_views(
    store: &dyn ChatStore,
    messages: Vec<Message>,
) -> Result<Vec<MessageView>, StoreError> {
    let mut views = Vec::with_capacity(messages.len());
    for message in messages {
        let reactions = store.reaction_aggregate(&message.id).await?;
        let reply_count = store.reply_count(&message.id).await?;
        views.push(MessageView {
            message,
            reactions,
            reply_count,
        });
    }
    Ok(views)
}

/// 1 つの接続にイベントを送る。送信失敗はログに残して続行する
pub(crate) async fn push(pusher: &dyn MessagePusher, target: &ConnectionId, event: &RoomEvent) {
    if let Err(e) = pusher.push_to(target, event).await {
        tracing::warn!(connection_id = %target, "Failed to push {}: {}", event.name(), e);
    }
}

/// 複数の接続にイベントを送る
pub(crate) async fn broadcast(
    pusher: &dyn MessagePusher,
    targets: Vec<ConnectionId>,
    event: &RoomEvent,
) {
    if let Err(e) = pusher.broadcast(targets, event).await {
        tracing::warn!("Failed to broadcast {}: {}", event.name(), e);
    }
}

/// 文字数（コードポイント数）で切り詰める
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
