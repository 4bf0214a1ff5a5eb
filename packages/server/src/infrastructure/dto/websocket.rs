//! WebSocket frame DTOs.
//!
//! Every frame is a JSON object tagged by `type` with camelCase fields, e.g.
//! `{"type":"join-channel","channelId":"general"}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ========================================
// Inbound
// ========================================

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room_id: String,
        #[serde(default)]
        display_name: Option<String>,
    },
    LeaveRoom,
    StatusChange {
        status: String,
    },
    MuteState {
        muted: bool,
    },
    CreateChannel {
        #[serde(alias = "channelName")]
        name: String,
        #[serde(alias = "channelType")]
        kind: String,
    },
    JoinChannel {
        channel_id: String,
    },
    LeaveChannel {
        channel_id: String,
    },
    ChatMessage {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        attachment: Option<Value>,
    },
    SendReply {
        channel_id: String,
        parent_id: String,
        #[serde(default)]
        text: Option<String>,
    },
    ReactionAdd {
        #[serde(default)]
        channel_id: Option<String>,
        message_id: String,
        emoji: String,
    },
    ReactionRemove {
        #[serde(default)]
        channel_id: Option<String>,
        message_id: String,
        emoji: String,
    },
    GetThread {
        channel_id: String,
        #[serde(alias = "parentId")]
        message_id: String,
    },
    CloseThread,
    Typing {
        channel_id: String,
    },
    StopTyping {
        channel_id: String,
    },
    #[serde(alias = "webrtc-offer")]
    SignalOffer {
        #[serde(alias = "targetId")]
        target_connection_id: String,
        #[serde(alias = "offer")]
        payload: Value,
    },
    #[serde(alias = "webrtc-answer")]
    SignalAnswer {
        #[serde(alias = "targetId")]
        target_connection_id: String,
        #[serde(alias = "answer")]
        payload: Value,
    },
    #[serde(alias = "webrtc-ice-candidate")]
    SignalIce {
        #[serde(alias = "targetId")]
        target_connection_id: String,
        #[serde(alias = "candidate")]
        payload: Value,
    },
}

// ========================================
// Outbound
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub connection_id: String,
    pub user_id: String,
    pub display_name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionDto {
    pub count: usize,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub attachment: Option<AttachmentDto>,
    pub reply_to: Option<String>,
    pub created_at: i64,
    pub reactions: BTreeMap<String, ReactionDto>,
    pub reply_count: usize,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Connected {
        connection_id: String,
        user_id: String,
        display_name: String,
    },
    RoomInfo {
        room_id: String,
        channels: Vec<ChannelDto>,
        users: Vec<UserDto>,
    },
    ChannelsUpdated {
        channels: Vec<ChannelDto>,
    },
    UserJoinedRoom {
        connection_id: String,
        user_id: String,
        display_name: String,
        status: String,
    },
    UserLeftRoom {
        connection_id: String,
        user_id: String,
        display_name: String,
    },
    UserStatusUpdate {
        connection_id: String,
        status: String,
    },
    UserMuteState {
        connection_id: String,
        muted: bool,
    },
    ChannelUsers {
        channel_id: String,
        users: Vec<UserDto>,
    },
    UserJoinedChannel {
        connection_id: String,
        user_id: String,
        display_name: String,
        channel_id: String,
    },
    UserLeftChannel {
        connection_id: String,
        channel_id: String,
    },
    MessageHistory {
        channel_id: String,
        messages: Vec<MessageDto>,
    },
    ChatMessage(MessageDto),
    ThreadUpdated {
        parent_id: String,
        replies: Vec<MessageDto>,
    },
    ThreadHistory {
        parent_id: String,
        replies: Vec<MessageDto>,
    },
    MessageReplyCountChanged {
        id: String,
        count: usize,
    },
    ReactionUpdate {
        message_id: String,
        channel_id: String,
        reactions: BTreeMap<String, ReactionDto>,
    },
    UserTyping {
        connection_id: String,
        display_name: String,
        channel_id: String,
    },
    UserStoppedTyping {
        connection_id: String,
        channel_id: String,
    },
    SignalOffer {
        from_connection_id: String,
        display_name: String,
        payload: Value,
    },
    SignalAnswer {
        from_connection_id: String,
        payload: Value,
    },
    SignalIce {
        from_connection_id: String,
        payload: Value,
    },
    ChannelError {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_join_channel() {
        // テスト項目: join-channel フレームを解釈できる
        // given (前提条件):
        let json = r#"{"type":"join-channel","channelId":"general"}"#;

        // when (操作):
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            msg,
            ClientMessage::JoinChannel {
                channel_id: "general".to_string()
            }
        );
    }

    #[test]
    fn test_client_message_unit_variants() {
        // テスト項目: フィールドを持たないフレームを解釈できる
        // given (前提条件):
        let leave = r#"{"type":"leave-room"}"#;
        let close = r#"{"type":"close-thread"}"#;

        // when (操作):
        let leave: ClientMessage = serde_json::from_str(leave).unwrap();
        let close: ClientMessage = serde_json::from_str(close).unwrap();

        // then (期待する結果):
        assert_eq!(leave, ClientMessage::LeaveRoom);
        assert_eq!(close, ClientMessage::CloseThread);
    }

    #[test]
    fn test_client_message_create_channel_aliases() {
        // テスト項目: 旧形式の channelName / channelType でもチャンネル作成を解釈できる
        // given (前提条件):
        let json = r#"{"type":"create-channel","channelName":"Lounge","channelType":"voice"}"#;

        // when (操作):
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            msg,
            ClientMessage::CreateChannel {
                name: "Lounge".to_string(),
                kind: "voice".to_string()
            }
        );
    }

    #[test]
    fn test_client_message_webrtc_alias() {
        // テスト項目: webrtc-offer / targetId 形式のシグナリングを解釈できる
        // given (前提条件):
        let json = r#"{"type":"webrtc-offer","targetId":"c2","offer":{"sdp":"v=0"}}"#;

        // when (操作):
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(
            msg,
            ClientMessage::SignalOffer {
                target_connection_id: "c2".to_string(),
                payload: json!({"sdp": "v=0"}),
            }
        );
    }

    #[test]
    fn test_client_message_unknown_type_is_error() {
        // テスト項目: 未知の type はパースエラーになる
        // given (前提条件):
        let json = r#"{"type":"self-destruct"}"#;

        // when (操作):
        let result = serde_json::from_str::<ClientMessage>(json);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_serialization() {
        // テスト項目: サーバーフレームが type タグと camelCase フィールドで出力される
        // given (前提条件):
        let msg = ServerMessage::UserLeftChannel {
            connection_id: "c1".to_string(),
            channel_id: "general".to_string(),
        };

        // when (操作):
        let value = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({"type": "user-left-channel", "connectionId": "c1", "channelId": "general"})
        );
    }

    #[test]
    fn test_server_message_chat_message_is_flat() {
        // テスト項目: chat-message はメッセージのフィールドが type と同じ階層に並ぶ
        // given (前提条件):
        let msg = ServerMessage::ChatMessage(MessageDto {
            id: "m1".to_string(),
            channel_id: "lounge".to_string(),
            user_id: "alice".to_string(),
            display_name: "Alice".to_string(),
            text: "hi".to_string(),
            attachment: None,
            reply_to: None,
            created_at: 1000,
            reactions: BTreeMap::new(),
            reply_count: 0,
        });

        // when (操作):
        let value = serde_json::to_value(&msg).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "chat-message");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["channelId"], "lounge");
        assert_eq!(value["replyCount"], 0);
    }
}
