//! InMemory Connection Repository 実装
//!
//! 接続 ID → 接続情報（身元・ステータス・参加中のルーム）のマップ。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ConnectionId, ConnectionRecord, ConnectionRepository, DisplayName, PresenceStatus,
    RepositoryError, RoomId,
};

pub struct InMemoryConnectionRepository {
    connections: Mutex<HashMap<ConnectionId, ConnectionRecord>>,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    async fn update<F>(&self, connection_id: &ConnectionId, f: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut ConnectionRecord) + Send,
    {
        let mut connections = self.connections.lock().await;
        let record = connections
            .get_mut(connection_id)
            .ok_or_else(|| RepositoryError::ConnectionNotFound(connection_id.to_string()))?;
        f(record);
        Ok(())
    }
}

impl Default for InMemoryConnectionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnectionRepository {
    async fn register(&self, record: ConnectionRecord) -> Result<(), RepositoryError> {
        let mut connections = self.connections.lock().await;
        if connections.contains_key(&record.connection_id) {
            return Err(RepositoryError::DuplicateConnection(
                record.connection_id.into_string(),
            ));
        }
        connections.insert(record.connection_id.clone(), record);
        Ok(())
    }

    async fn get(&self, connection_id: &ConnectionId) -> Option<ConnectionRecord> {
        let connections = self.connections.lock().await;
        connections.get(connection_id).cloned()
    }

    async fn set_room(
        &self,
        connection_id: &ConnectionId,
        room_id: Option<RoomId>,
    ) -> Result<(), RepositoryError> {
        self.update(connection_id, |record| record.room_id = room_id)
            .await
    }

    async fn set_display_name(
        &self,
        connection_id: &ConnectionId,
        display_name: DisplayName,
    ) -> Result<(), RepositoryError> {
        self.update(connection_id, |record| {
            record.identity.display_name = display_name
        })
        .await
    }

    async fn set_status(
        &self,
        connection_id: &ConnectionId,
        status: PresenceStatus,
    ) -> Result<(), RepositoryError> {
        self.update(connection_id, |record| record.identity.status = status)
            .await
    }

    async fn unregister(&self, connection_id: &ConnectionId) -> Option<ConnectionRecord> {
        let mut connections = self.connections.lock().await;
        connections.remove(connection_id)
    }

    async fn count(&self) -> usize {
        let connections = self.connections.lock().await;
        connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, Timestamp, UserId};

    fn record(id: &str) -> ConnectionRecord {
        ConnectionRecord::new(
            ConnectionId::new(id.to_string()).unwrap(),
            Identity::new(
                UserId::new(format!("user-{}", id)).unwrap(),
                DisplayName::new(id.to_string()).unwrap(),
            ),
            Timestamp::new(1000),
        )
    }

    #[tokio::test]
    async fn test_register_and_get() {
        // テスト項目: 登録した接続を取得できる
        // given (前提条件):
        let repo = InMemoryConnectionRepository::new();

        // when (操作):
        repo.register(record("c1")).await.unwrap();

        // then (期待する結果):
        let found = repo.get(&ConnectionId::new("c1".to_string()).unwrap()).await;
        assert_eq!(found, Some(record("c1")));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        // テスト項目: 同じ接続 ID は二重登録できない
        // given (前提条件):
        let repo = InMemoryConnectionRepository::new();
        repo.register(record("c1")).await.unwrap();

        // when (操作):
        let result = repo.register(record("c1")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::DuplicateConnection("c1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_updates() {
        // テスト項目: ルーム・表示名・ステータスを更新できる
        // given (前提条件):
        let repo = InMemoryConnectionRepository::new();
        repo.register(record("c1")).await.unwrap();
        let id = ConnectionId::new("c1".to_string()).unwrap();

        // when (操作):
        repo.set_room(&id, Some(RoomId::new("lobby".to_string()).unwrap()))
            .await
            .unwrap();
        repo.set_display_name(&id, DisplayName::new("Renamed".to_string()).unwrap())
            .await
            .unwrap();
        repo.set_status(&id, PresenceStatus::Dnd).await.unwrap();

        // then (期待する結果):
        let found = repo.get(&id).await.unwrap();
        assert_eq!(found.room_id.unwrap().as_str(), "lobby");
        assert_eq!(found.identity.display_name.as_str(), "Renamed");
        assert_eq!(found.identity.status, PresenceStatus::Dnd);
    }

    #[tokio::test]
    async fn test_update_unknown_connection() {
        // テスト項目: 未登録の接続は更新できない
        // given (前提条件):
        let repo = InMemoryConnectionRepository::new();
        let id = ConnectionId::new("ghost".to_string()).unwrap();

        // when (操作):
        let result = repo.set_status(&id, PresenceStatus::Idle).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::ConnectionNotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unregister() {
        // テスト項目: 登録解除すると取得できなくなる
        // given (前提条件):
        let repo = InMemoryConnectionRepository::new();
        repo.register(record("c1")).await.unwrap();
        let id = ConnectionId::new("c1".to_string()).unwrap();

        // when (操作):
        let removed = repo.unregister(&id).await;

        // then (期待する結果):
        assert!(removed.is_some());
        assert!(repo.get(&id).await.is_none());
        assert!(repo.unregister(&id).await.is_none());
    }
}
