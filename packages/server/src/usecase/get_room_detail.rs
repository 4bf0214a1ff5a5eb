//! UseCase: ルーム詳細取得

use std::sync::Arc;

use crate::domain::{RoomId, RoomRepository, RoomSnapshot};

use super::error::GetRoomDetailError;

/// ルーム詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    room_repository: Arc<dyn RoomRepository>,
}

impl GetRoomDetailUseCase {
    pub fn new(room_repository: Arc<dyn RoomRepository>) -> Self {
        Self { room_repository }
    }

    /// チャンネル一覧（メンバー数付き）とプレゼンス一覧を返す
    ///
    /// # Returns
    ///
    /// * `Ok(RoomSnapshot)` - ルームのスナップショット
    /// * `Err(GetRoomDetailError::RoomNotFound)` - ルームが存在しない（空になって除去された場合も含む）
    pub async fn execute(&self, room_id: &RoomId) -> Result<RoomSnapshot, GetRoomDetailError> {
        let room = self
            .room_repository
            .find(room_id)
            .await
            .ok_or(GetRoomDetailError::RoomNotFound)?;
        let snapshot = room.lock().await.snapshot();
        Ok(snapshot)
    }
}
