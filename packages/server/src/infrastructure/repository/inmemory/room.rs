//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をルームテーブルとして使用し、ルームごとに個別の `Mutex` を持たせます。
//!
//! ## ロックの順序
//!
//! テーブルのロックを保持したままルームのロックを待つことはありません。
//! `remove_if_empty` だけは `try_lock` でルームの状態を確認します。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tsudoi_shared::time::Clock;

use crate::domain::{Room, RoomId, RoomRepository, Timestamp};

/// インメモリ Room Repository 実装
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<RoomId, Arc<Mutex<Room>>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn get_or_create(&self, room_id: &RoomId) -> Arc<Mutex<Room>> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                tracing::debug!(room_id = %room_id, "Room created");
                Arc::new(Mutex::new(Room::new(
                    room_id.clone(),
                    Timestamp::new(self.clock.now_millis()),
                )))
            })
            .clone()
    }

    async fn find(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).cloned()
    }

    async fn remove_if_empty(&self, room_id: &RoomId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(room_id).cloned() else {
            return false;
        };

        // 他の操作が進行中なら、その操作に任せる
        let Ok(mut guard) = room.try_lock() else {
            return false;
        };
        if !guard.is_empty() {
            return false;
        }
        guard.mark_evicted();
        rooms.remove(room_id);
        tracing::debug!(room_id = %room_id, "Room evicted");
        true
    }

    async fn list(&self) -> Vec<Arc<Mutex<Room>>> {
        let rooms = self.rooms.lock().await;
        rooms.values().cloned().collect()
    }
}
