//! InMemory ChatStore 実装
//!
//! チャンネル定義・メッセージ・リアクションをプロセス内に保持します。
//! ルームがテーブルから除去されてもこちらのデータは残るため、再参加時に履歴を復元できます。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChannelDefinition, ChannelId, ChatStore, Emoji, Message, MessageId, ReactionMap,
    ReactionSummary, RoomId, StoreError, UserId,
};

#[derive(Default)]
struct StoreState {
    channels: HashMap<RoomId, Vec<ChannelDefinition>>,
    /// 保存順（= 時刻順）に並んだメッセージ
    messages: Vec<(RoomId, Message)>,
    index: HashMap<MessageId, usize>,
    /// message → emoji → リアクションした順のユーザー
    reactions: HashMap<MessageId, BTreeMap<String, Vec<UserId>>>,
}

/// インメモリ ChatStore 実装
#[derive(Default)]
pub struct InMemoryChatStore {
    state: Mutex<StoreState>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_channel(
        &self,
        room_id: &RoomId,
        definition: &ChannelDefinition,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let definitions = state.channels.entry(room_id.clone()).or_default();
        if !definitions.iter().any(|d| d.id == definition.id) {
            definitions.push(definition.clone());
        }
        Ok(())
    }

    async fn channel_definitions(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<ChannelDefinition>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.channels.get(room_id).cloned().unwrap_or_default())
    }

    async fn save_message(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let position = state.messages.len();
        state.index.insert(message.id.clone(), position);
        state.messages.push((room_id.clone(), message.clone()));
        Ok(())
    }

    async fn get_message(
        &self,
        room_id: &RoomId,
        message_id: &MessageId,
    ) -> Result<Option<Message>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .index
            .get(message_id)
            .and_then(|&i| state.messages.get(i))
            .filter(|(room, _)| room == room_id)
            .map(|(_, message)| message.clone()))
    }

    async fn recent_messages(
        &self,
        room_id: &RoomId,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let state = self.state.lock().await;
        let mut recent: Vec<Message> = state
            .messages
            .iter()
            .rev()
            .filter(|(room, message)| {
                room == room_id && &message.channel_id == channel_id && !message.is_reply()
            })
            .take(limit)
            .map(|(_, message)| message.clone())
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn thread(&self, parent_id: &MessageId) -> Result<Vec<Message>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .filter(|(_, message)| message.reply_to.as_ref() == Some(parent_id))
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn reply_count(&self, parent_id: &MessageId) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .filter(|(_, message)| message.reply_to.as_ref() == Some(parent_id))
            .count())
    }

    async fn add_reaction(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
        emoji: &Emoji,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.index.contains_key(message_id) {
            return Err(StoreError::NotFound(message_id.to_string()));
        }
        let users = state
            .reactions
            .entry(message_id.clone())
            .or_default()
            .entry(emoji.as_str().to_string())
            .or_default();
        if !users.contains(user_id) {
            users.push(user_id.clone());
        }
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message_id: &MessageId,
        user_id: &UserId,
        emoji: &Emoji,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(by_emoji) = state.reactions.get_mut(message_id) {
            if let Some(users) = by_emoji.get_mut(emoji.as_str()) {
                users.retain(|u| u != user_id);
                if users.is_empty() {
                    by_emoji.remove(emoji.as_str());
                }
            }
            if by_emoji.is_empty() {
                state.reactions.remove(message_id);
            }
        }
        Ok(())
    }

    async fn reaction_aggregate(&self, message_id: &MessageId) -> Result<ReactionMap, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .reactions
            .get(message_id)
            .map(|by_emoji| {
                by_emoji
                    .iter()
                    .map(|(emoji, users)| {
                        (
                            emoji.clone(),
                            ReactionSummary {
                                count: users.len(),
                                users: users.clone(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
