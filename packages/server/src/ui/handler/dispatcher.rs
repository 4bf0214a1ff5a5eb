//! Inbound frame dispatch.
//!
//! Converts a parsed `ClientMessage` into domain values and calls the matching use case.
//! Failures go back to the originating connection only, as `channel-error`.

use crate::{
    domain::{
        ChannelId, ChannelKind, ConnectionId, Emoji, MessageId, PresenceStatus, RawAttachment,
        RoomEvent, RoomId, SignalKind,
    },
    infrastructure::dto::websocket::ClientMessage,
    ui::state::AppState,
    usecase::RoomActionError,
};

/// Handle one inbound frame for `connection_id`
pub async fn dispatch(state: &AppState, connection_id: &ConnectionId, message: ClientMessage) {
    let kind = frame_name(&message);
    let Err(e) = execute(state, connection_id, message).await else {
        return;
    };

    if e.is_silent() {
        tracing::debug!(connection_id = %connection_id, frame = kind, "Dropped request: {}", e);
        return;
    }
    tracing::warn!(connection_id = %connection_id, frame = kind, "Rejected request: {}", e);

    let event = RoomEvent::ChannelError {
        message: e.client_message(),
    };
    if let Err(push_error) = state.message_pusher.push_to(connection_id, &event).await {
        tracing::warn!(connection_id = %connection_id, "Failed to push channel-error: {}", push_error);
    }
}

async fn execute(
    state: &AppState,
    connection_id: &ConnectionId,
    message: ClientMessage,
) -> Result<(), RoomActionError> {
    match message {
        ClientMessage::JoinRoom {
            room_id,
            display_name,
        } => {
            state
                .join_room_usecase
                .execute(connection_id, RoomId::new(room_id)?, display_name)
                .await?;
        }
        ClientMessage::LeaveRoom => {
            state.leave_room_usecase.execute(connection_id).await;
        }
        ClientMessage::StatusChange { status } => {
            let status: PresenceStatus = status.parse()?;
            state
                .update_presence_usecase
                .change_status(connection_id, status)
                .await?;
        }
        ClientMessage::MuteState { muted } => {
            state
                .update_presence_usecase
                .set_muted(connection_id, muted)
                .await?;
        }
        ClientMessage::CreateChannel { name, kind } => {
            let kind: ChannelKind = kind.parse()?;
            state
                .create_channel_usecase
                .execute(connection_id, &name, kind)
                .await?;
        }
        ClientMessage::JoinChannel { channel_id } => {
            state
                .join_channel_usecase
                .execute(connection_id, ChannelId::new(channel_id)?)
                .await?;
        }
        ClientMessage::LeaveChannel { channel_id } => {
            state
                .leave_channel_usecase
                .execute(connection_id, ChannelId::new(channel_id)?)
                .await?;
        }
        ClientMessage::ChatMessage { text, attachment } => {
            state
                .send_message_usecase
                .execute(
                    connection_id,
                    text.unwrap_or_default(),
                    attachment.as_ref().map(RawAttachment::from),
                )
                .await?;
        }
        ClientMessage::SendReply {
            parent_id, text, ..
        } => {
            state
                .post_reply_usecase
                .execute(
                    connection_id,
                    MessageId::new(parent_id)?,
                    text.unwrap_or_default(),
                )
                .await?;
        }
        ClientMessage::ReactionAdd {
            message_id, emoji, ..
        } => {
            state
                .react_usecase
                .add(connection_id, MessageId::new(message_id)?, Emoji::new(emoji)?)
                .await?;
        }
        ClientMessage::ReactionRemove {
            message_id, emoji, ..
        } => {
            state
                .react_usecase
                .remove(connection_id, MessageId::new(message_id)?, Emoji::new(emoji)?)
                .await?;
        }
        ClientMessage::GetThread {
            channel_id,
            message_id,
        } => {
            state
                .view_thread_usecase
                .open(
                    connection_id,
                    ChannelId::new(channel_id)?,
                    MessageId::new(message_id)?,
                )
                .await?;
        }
        ClientMessage::CloseThread => {
            state.view_thread_usecase.close(connection_id).await?;
        }
        ClientMessage::Typing { channel_id } => {
            state
                .update_presence_usecase
                .start_typing(connection_id, ChannelId::new(channel_id)?)
                .await?;
        }
        ClientMessage::StopTyping { channel_id } => {
            state
                .update_presence_usecase
                .stop_typing(connection_id, ChannelId::new(channel_id)?)
                .await?;
        }
        ClientMessage::SignalOffer {
            target_connection_id,
            payload,
        } => relay(state, connection_id, target_connection_id, SignalKind::Offer, payload).await?,
        ClientMessage::SignalAnswer {
            target_connection_id,
            payload,
        } => relay(state, connection_id, target_connection_id, SignalKind::Answer, payload).await?,
        ClientMessage::SignalIce {
            target_connection_id,
            payload,
        } => {
            relay(
                state,
                connection_id,
                target_connection_id,
                SignalKind::IceCandidate,
                payload,
            )
            .await?
        }
    }
    Ok(())
}

async fn relay(
    state: &AppState,
    from: &ConnectionId,
    target: String,
    kind: SignalKind,
    payload: serde_json::Value,
) -> Result<(), RoomActionError> {
    let target = ConnectionId::new(target.clone())
        .map_err(|_| RoomActionError::SignalTargetNotFound(target))?;
    state
        .relay_signal_usecase
        .execute(from, &target, kind, payload)
        .await
}

fn frame_name(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::JoinRoom { .. } => "join-room",
        ClientMessage::LeaveRoom => "leave-room",
        ClientMessage::StatusChange { .. } => "status-change",
        ClientMessage::MuteState { .. } => "mute-state",
        ClientMessage::CreateChannel { .. } => "create-channel",
        ClientMessage::JoinChannel { .. } => "join-channel",
        ClientMessage::LeaveChannel { .. } => "leave-channel",
        ClientMessage::ChatMessage { .. } => "chat-message",
        ClientMessage::SendReply { .. } => "send-reply",
        ClientMessage::ReactionAdd { .. } => "reaction-add",
        ClientMessage::ReactionRemove { .. } => "reaction-remove",
        ClientMessage::GetThread { .. } => "get-thread",
        ClientMessage::CloseThread => "close-thread",
        ClientMessage::Typing { .. } => "typing",
        ClientMessage::StopTyping { .. } => "stop-typing",
        ClientMessage::SignalOffer { .. } => "signal-offer",
        ClientMessage::SignalAnswer { .. } => "signal-answer",
        ClientMessage::SignalIce { .. } => "signal-ice",
    }
}
