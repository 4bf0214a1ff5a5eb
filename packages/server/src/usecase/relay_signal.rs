//! UseCase: シグナリング中継
//!
//! WebRTC のオファー・アンサー・ICE 候補を宛先の接続にだけ届ける。
//! チャンネルのブロードキャストグループには触れず、ペイロードの中身も見ない。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RelaySignalUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - シグナリングのペイロードは宛先以外に漏れてはならない
//! - 相手がすでに切断しているのはよくある競合なので、エラーにせず捨てる
//!
//! ### どのような状況を想定しているか
//! - 正常系：オファー（送信者の表示名付き）・アンサー・ICE 候補の中継
//! - エッジケース：宛先が存在しない

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{ConnectionId, ConnectionRepository, MessagePusher, RoomEvent, SignalKind};

use super::error::RoomActionError;

/// シグナリング中継のユースケース
pub struct RelaySignalUseCase {
    connection_repository: Arc<dyn ConnectionRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl RelaySignalUseCase {
    pub fn new(
        connection_repository: Arc<dyn ConnectionRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            connection_repository,
            message_pusher,
        }
    }

    /// 宛先の接続にシグナリングメッセージを中継する
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 中継した
    /// * `Err(RoomActionError::SignalTargetNotFound)` - 宛先がいない（呼び出し側は黙って捨てる）
    pub async fn execute(
        &self,
        from: &ConnectionId,
        target: &ConnectionId,
        kind: SignalKind,
        payload: Value,
    ) -> Result<(), RoomActionError> {
        let sender = self
            .connection_repository
            .get(from)
            .await
            .ok_or(RoomActionError::NotInRoom)?;
        if self.connection_repository.get(target).await.is_none() {
            return Err(RoomActionError::SignalTargetNotFound(target.to_string()));
        }

        let event = RoomEvent::Signal {
            kind,
            from: from.clone(),
            display_name: sender.identity.display_name,
            payload,
        };
        self.message_pusher
            .push_to(target, &event)
            .await
            .map_err(|_| RoomActionError::SignalTargetNotFound(target.to_string()))?;

        tracing::debug!(from = %from, target = %target, kind = ?kind, "Signal relayed");
        Ok(())
    }
}
