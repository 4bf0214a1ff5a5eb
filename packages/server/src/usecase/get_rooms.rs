//! UseCase: ルーム一覧取得

use std::sync::Arc;

use crate::domain::{RoomRepository, RoomSummary};

/// ルーム一覧取得のユースケース
pub struct GetRoomsUseCase {
    room_repository: Arc<dyn RoomRepository>,
}

impl GetRoomsUseCase {
    pub fn new(room_repository: Arc<dyn RoomRepository>) -> Self {
        Self { room_repository }
    }

    /// 生きているルームの一覧を ID 順に返す
    pub async fn execute(&self) -> Vec<RoomSummary> {
        let mut summaries = Vec::new();
        for room in self.room_repository.list().await {
            summaries.push(room.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }
}
