//! Conversion logic between DTOs and domain entities.

use serde_json::Value;
use tsudoi_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    Attachment, ChannelSummary, MessageView, PresenceEntry, RawAttachment, ReactionMap,
    RoomEvent, RoomSnapshot, RoomSummary, SignalKind,
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// DTO → Domain Entity
// ========================================

/// Loosely typed JSON value → string (numbers and booleans are stringified)
fn loose_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Loosely typed JSON value → non-negative integer (anything unusable becomes 0)
fn loose_size(value: Option<&Value>) -> u64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => n.floor() as u64,
        _ => 0,
    }
}

impl From<&Value> for RawAttachment {
    fn from(value: &Value) -> Self {
        Self {
            url: loose_string(value.get("url")),
            name: loose_string(value.get("name")),
            mime_type: loose_string(value.get("mimeType").or_else(|| value.get("type"))),
            size: loose_size(value.get("size")),
        }
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&ChannelSummary> for dto::ChannelDto {
    fn from(model: &ChannelSummary) -> Self {
        Self {
            id: model.id.as_str().to_string(),
            name: model.name.clone(),
            kind: model.kind.as_str().to_string(),
            member_count: model.member_count,
        }
    }
}

impl From<&PresenceEntry> for dto::UserDto {
    fn from(model: &PresenceEntry) -> Self {
        Self {
            connection_id: model.connection_id.as_str().to_string(),
            user_id: model.user_id.as_str().to_string(),
            display_name: model.display_name.as_str().to_string(),
            status: model.status.as_str().to_string(),
        }
    }
}

impl From<&Attachment> for dto::AttachmentDto {
    fn from(model: &Attachment) -> Self {
        Self {
            url: model.url.clone(),
            name: model.name.clone(),
            mime_type: model.mime_type.clone(),
            size: model.size,
        }
    }
}

fn reactions_to_dto(
    reactions: &ReactionMap,
) -> std::collections::BTreeMap<String, dto::ReactionDto> {
    reactions
        .iter()
        .map(|(emoji, summary)| {
            (
                emoji.clone(),
                dto::ReactionDto {
                    count: summary.count,
                    users: summary
                        .users
                        .iter()
                        .map(|u| u.as_str().to_string())
                        .collect(),
                },
            )
        })
        .collect()
}

impl From<&MessageView> for dto::MessageDto {
    fn from(model: &MessageView) -> Self {
        let message = &model.message;
        Self {
            id: message.id.as_str().to_string(),
            channel_id: message.channel_id.as_str().to_string(),
            user_id: message.author_id.as_str().to_string(),
            display_name: message.author_name.as_str().to_string(),
            text: message.text.clone(),
            attachment: message.attachment.as_ref().map(Into::into),
            reply_to: message.reply_to.as_ref().map(|id| id.as_str().to_string()),
            created_at: message.created_at.value(),
            reactions: reactions_to_dto(&model.reactions),
            reply_count: model.reply_count,
        }
    }
}

fn channels(models: &[ChannelSummary]) -> Vec<dto::ChannelDto> {
    models.iter().map(Into::into).collect()
}

fn users(models: &[PresenceEntry]) -> Vec<dto::UserDto> {
    models.iter().map(Into::into).collect()
}

fn messages(models: &[MessageView]) -> Vec<dto::MessageDto> {
    models.iter().map(Into::into).collect()
}

impl From<&RoomEvent> for dto::ServerMessage {
    fn from(event: &RoomEvent) -> Self {
        match event {
            RoomEvent::Connected {
                connection_id,
                user_id,
                display_name,
            } => Self::Connected {
                connection_id: connection_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
                display_name: display_name.as_str().to_string(),
            },
            RoomEvent::RoomInfo {
                room_id,
                channels: c,
                users: u,
            } => Self::RoomInfo {
                room_id: room_id.as_str().to_string(),
                channels: channels(c),
                users: users(u),
            },
            RoomEvent::ChannelsUpdated { channels: c } => Self::ChannelsUpdated {
                channels: channels(c),
            },
            RoomEvent::UserJoinedRoom { user } => Self::UserJoinedRoom {
                connection_id: user.connection_id.as_str().to_string(),
                user_id: user.user_id.as_str().to_string(),
                display_name: user.display_name.as_str().to_string(),
                status: user.status.as_str().to_string(),
            },
            RoomEvent::UserLeftRoom {
                connection_id,
                user_id,
                display_name,
            } => Self::UserLeftRoom {
                connection_id: connection_id.as_str().to_string(),
                user_id: user_id.as_str().to_string(),
                display_name: display_name.as_str().to_string(),
            },
            RoomEvent::UserStatusUpdate {
                connection_id,
                status,
            } => Self::UserStatusUpdate {
                connection_id: connection_id.as_str().to_string(),
                status: status.as_str().to_string(),
            },
            RoomEvent::UserMuteState {
                connection_id,
                muted,
            } => Self::UserMuteState {
                connection_id: connection_id.as_str().to_string(),
                muted: *muted,
            },
            RoomEvent::ChannelUsers {
                channel_id,
                users: u,
            } => Self::ChannelUsers {
                channel_id: channel_id.as_str().to_string(),
                users: users(u),
            },
            RoomEvent::UserJoinedChannel { user, channel_id } => Self::UserJoinedChannel {
                connection_id: user.connection_id.as_str().to_string(),
                user_id: user.user_id.as_str().to_string(),
                display_name: user.display_name.as_str().to_string(),
                channel_id: channel_id.as_str().to_string(),
            },
            RoomEvent::UserLeftChannel {
                connection_id,
                channel_id,
            } => Self::UserLeftChannel {
                connection_id: connection_id.as_str().to_string(),
                channel_id: channel_id.as_str().to_string(),
            },
            RoomEvent::MessageHistory {
                channel_id,
                messages: m,
            } => Self::MessageHistory {
                channel_id: channel_id.as_str().to_string(),
                messages: messages(m),
            },
            RoomEvent::ChatMessage(view) => Self::ChatMessage(view.into()),
            RoomEvent::ThreadUpdated { parent_id, replies } => Self::ThreadUpdated {
                parent_id: parent_id.as_str().to_string(),
                replies: messages(replies),
            },
            RoomEvent::ThreadHistory { parent_id, replies } => Self::ThreadHistory {
                parent_id: parent_id.as_str().to_string(),
                replies: messages(replies),
            },
            RoomEvent::MessageReplyCountChanged { message_id, count } => {
                Self::MessageReplyCountChanged {
                    id: message_id.as_str().to_string(),
                    count: *count,
                }
            }
            RoomEvent::ReactionUpdate {
                message_id,
                channel_id,
                reactions,
            } => Self::ReactionUpdate {
                message_id: message_id.as_str().to_string(),
                channel_id: channel_id.as_str().to_string(),
                reactions: reactions_to_dto(reactions),
            },
            RoomEvent::UserTyping {
                connection_id,
                display_name,
                channel_id,
            } => Self::UserTyping {
                connection_id: connection_id.as_str().to_string(),
                display_name: display_name.as_str().to_string(),
                channel_id: channel_id.as_str().to_string(),
            },
            RoomEvent::UserStoppedTyping {
                connection_id,
                channel_id,
            } => Self::UserStoppedTyping {
                connection_id: connection_id.as_str().to_string(),
                channel_id: channel_id.as_str().to_string(),
            },
            RoomEvent::Signal {
                kind,
                from,
                display_name,
                payload,
            } => {
                let from_connection_id = from.as_str().to_string();
                let payload = payload.clone();
                match kind {
                    SignalKind::Offer => Self::SignalOffer {
                        from_connection_id,
                        display_name: display_name.as_str().to_string(),
                        payload,
                    },
                    SignalKind::Answer => Self::SignalAnswer {
                        from_connection_id,
                        payload,
                    },
                    SignalKind::IceCandidate => Self::SignalIce {
                        from_connection_id,
                        payload,
                    },
                }
            }
            RoomEvent::ChannelError { message } => Self::ChannelError {
                message: message.clone(),
            },
        }
    }
}

impl From<&RoomSummary> for http::RoomSummaryDto {
    fn from(model: &RoomSummary) -> Self {
        Self {
            id: model.room_id.as_str().to_string(),
            channel_count: model.channel_count,
            connected_count: model.connected_count,
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<&RoomSnapshot> for http::RoomDetailDto {
    fn from(model: &RoomSnapshot) -> Self {
        Self {
            id: model.room_id.as_str().to_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
            channels: channels(&model.channels),
            users: users(&model.users),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ChannelId, ChannelKind, ConnectionId, DisplayName, Message, MessageId, ReactionSummary,
        RoomId, Timestamp, UserId,
    };
    use serde_json::json;

    #[test]
    fn test_raw_attachment_coercion() {
        // テスト項目: 型の緩い添付情報が安全な型に揃えられる
        // given (前提条件):
        let value = json!({"url": 42, "name": "photo.png", "type": "image/png", "size": "2048"});

        // when (操作):
        let raw = RawAttachment::from(&value);

        // then (期待する結果):
        assert_eq!(raw.url.as_deref(), Some("42"));
        assert_eq!(raw.name.as_deref(), Some("photo.png"));
        assert_eq!(raw.mime_type.as_deref(), Some("image/png"));
        assert_eq!(raw.size, 2048);
    }

    #[test]
    fn test_raw_attachment_invalid_size() {
        // テスト項目: 数値として解釈できないサイズや負のサイズは 0 になる
        // given (前提条件):
        let not_a_number = json!({"url": "u", "size": "big"});
        let negative = json!({"url": "u", "size": -5});
        let object = json!({"url": "u", "size": {"bytes": 1}});

        // when (操作):
        let sizes: Vec<u64> = [not_a_number, negative, object]
            .iter()
            .map(|v| RawAttachment::from(v).size)
            .collect();

        // then (期待する結果):
        assert_eq!(sizes, vec![0, 0, 0]);
    }

    #[test]
    fn test_raw_attachment_from_non_object() {
        // テスト項目: オブジェクト以外の添付は URL 無しとして扱われる
        // given (前提条件):
        let value = json!("just a string");

        // when (操作):
        let raw = RawAttachment::from(&value);

        // then (期待する結果):
        assert_eq!(raw, RawAttachment::default());
    }

    #[test]
    fn test_chat_message_event_to_dto() {
        // テスト項目: ChatMessage イベントが MessageDto に変換される
        // given (前提条件):
        let mut reactions = ReactionMap::new();
        reactions.insert(
            "👍".to_string(),
            ReactionSummary {
                count: 1,
                users: vec![UserId::new("bob".to_string()).unwrap()],
            },
        );
        let view = MessageView {
            message: Message {
                id: MessageId::new("m1".to_string()).unwrap(),
                channel_id: ChannelId::new("lounge".to_string()).unwrap(),
                author_id: UserId::new("alice".to_string()).unwrap(),
                author_name: DisplayName::new("Alice".to_string()).unwrap(),
                text: "hi".to_string(),
                attachment: None,
                reply_to: None,
                created_at: Timestamp::new(1000),
            },
            reactions,
            reply_count: 2,
        };

        // when (操作):
        let msg: dto::ServerMessage = (&RoomEvent::ChatMessage(view)).into();

        // then (期待する結果):
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "chat-message");
        assert_eq!(value["userId"], "alice");
        assert_eq!(value["reactions"]["👍"], json!({"count": 1, "users": ["bob"]}));
        assert_eq!(value["replyCount"], 2);
    }

    #[test]
    fn test_signal_offer_carries_display_name() {
        // テスト項目: オファーには送信者の表示名が含まれる
        // given (前提条件):
        let event = RoomEvent::Signal {
            kind: SignalKind::Offer,
            from: ConnectionId::new("c1".to_string()).unwrap(),
            display_name: DisplayName::new("Alice".to_string()).unwrap(),
            payload: json!({"sdp": "v=0"}),
        };

        // when (操作):
        let value = serde_json::to_value(dto::ServerMessage::from(&event)).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({
                "type": "signal-offer",
                "fromConnectionId": "c1",
                "displayName": "Alice",
                "payload": {"sdp": "v=0"}
            })
        );
    }

    #[test]
    fn test_channels_updated_to_dto() {
        // テスト項目: チャンネル一覧は type と memberCount 付きで出力される
        // given (前提条件):
        let event = RoomEvent::ChannelsUpdated {
            channels: vec![ChannelSummary {
                id: ChannelId::new("voice-1".to_string()).unwrap(),
                name: "voice-1".to_string(),
                kind: ChannelKind::Voice,
                member_count: 3,
            }],
        };

        // when (操作):
        let value = serde_json::to_value(dto::ServerMessage::from(&event)).unwrap();

        // then (期待する結果):
        assert_eq!(
            value["channels"][0],
            json!({"id": "voice-1", "name": "voice-1", "type": "voice", "memberCount": 3})
        );
    }

    #[test]
    fn test_room_summary_to_dto() {
        // テスト項目: ルーム一覧の作成時刻は RFC 3339 (UTC) で出力される
        // given (前提条件):
        let summary = RoomSummary {
            room_id: RoomId::new("lobby".to_string()).unwrap(),
            created_at: Timestamp::new(1_704_067_200_000),
            channel_count: 2,
            connected_count: 1,
        };

        // when (操作):
        let value = serde_json::to_value(http::RoomSummaryDto::from(&summary)).unwrap();

        // then (期待する結果):
        assert_eq!(
            value,
            json!({
                "id": "lobby",
                "channelCount": 2,
                "connectedCount": 1,
                "createdAt": "2024-01-01T00:00:00+00:00"
            })
        );
    }
}
