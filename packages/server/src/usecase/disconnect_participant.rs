//! UseCase: 切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - ルームからの退出と、接続レジストリ・送信チャネルの登録解除
//!
//! ### なぜこのテストが必要か
//! - 切断後もレジストリに残ると、シグナリングが存在しない接続に中継され続ける
//!
//! ### どのような状況を想定しているか
//! - 正常系：ルーム参加中の接続の切断
//! - エッジケース：ルームに参加する前に切断
//! - エッジケース：ルームのロック待ちで中断された退出の後に切断

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRepository, Departure, MessagePusher};

use super::leave_room::LeaveRoomUseCase;

/// 切断のユースケース
pub struct DisconnectParticipantUseCase {
    leave_room: Arc<LeaveRoomUseCase>,
    connection_repository: Arc<dyn ConnectionRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectParticipantUseCase {
    pub fn new(
        leave_room: Arc<LeaveRoomUseCase>,
        connection_repository: Arc<dyn ConnectionRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            leave_room,
            connection_repository,
            message_pusher,
        }
    }

    /// 切断を実行
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - ルームに参加していた場合の退出結果
    /// * `None` - ルームに参加していなかった
    pub async fn execute(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let departure = self.leave_room.execute(connection_id).await;

        self.message_pusher.unregister_client(connection_id).await;
        if self
            .connection_repository
            .unregister(connection_id)
            .await
            .is_some()
        {
            tracing::info!(connection_id = %connection_id, "Connection unregistered");
        }

        departure
    }
}
