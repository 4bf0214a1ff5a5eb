//! UseCase: 接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - 接続レジストリへの登録と、送信チャネルの登録
//!
//! ### なぜこのテストが必要か
//! - クライアントは最初に届く `connected` で自分の接続 ID を知り、シグナリングに使う
//! - 同じユーザーが複数タブから接続しても、接続ごとに別の ID が払い出される必要がある
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規接続
//! - エッジケース：同じユーザー ID での複数接続

use std::sync::Arc;

use tsudoi_shared::time::Clock;

use crate::domain::{
    ConnectionId, ConnectionRecord, ConnectionRepository, Identity, MessagePusher,
    PusherChannel, RepositoryError, RoomEvent, Timestamp, VerifiedIdentity,
};

use super::error::ConnectError;

/// 接続のユースケース
pub struct ConnectParticipantUseCase {
    /// 接続レジストリ
    connection_repository: Arc<dyn ConnectionRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl ConnectParticipantUseCase {
    pub fn new(
        connection_repository: Arc<dyn ConnectionRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connection_repository,
            message_pusher,
            clock,
        }
    }

    /// 接続を登録し、`connected` を送信する
    ///
    /// # Arguments
    ///
    /// * `identity` - 検証済みの身元
    /// * `sender` - クライアントへのフレーム送信用チャネル
    ///
    /// # Returns
    ///
    /// * `Ok(ConnectionRecord)` - 払い出された接続 ID を含む接続情報
    /// * `Err(ConnectError)` - 接続失敗
    pub async fn execute(
        &self,
        identity: VerifiedIdentity,
        sender: PusherChannel,
    ) -> Result<ConnectionRecord, ConnectError> {
        let connection_id = ConnectionId::generate();
        let record = ConnectionRecord::new(
            connection_id.clone(),
            Identity::new(identity.user_id, identity.display_name),
            Timestamp::new(self.clock.now_millis()),
        );

        self.connection_repository
            .register(record.clone())
            .await
            .map_err(|e| match e {
                RepositoryError::DuplicateConnection(id)
                | RepositoryError::ConnectionNotFound(id) => ConnectError::DuplicateConnection(id),
            })?;
        self.message_pusher
            .register_client(connection_id.clone(), sender)
            .await;

        let connected = RoomEvent::Connected {
            connection_id: connection_id.clone(),
            user_id: record.identity.user_id.clone(),
            display_name: record.identity.display_name.clone(),
        };
        if let Err(e) = self.message_pusher.push_to(&connection_id, &connected).await {
            tracing::warn!(connection_id = %connection_id, "Failed to push connected: {}", e);
        }

        tracing::info!(
            connection_id = %connection_id,
            user_id = %record.identity.user_id,
            "Connection registered"
        );
        Ok(record)
    }
}
