//! Entity 定義
//!
//! ルーム・チャンネル・メンバー・メッセージなど、識別子を持つドメインモデルを定義します。
//!
//! ## 不変条件
//!
//! - 1 つの接続がアクティブにできるチャンネルは種類（text / voice）ごとに最大 1 つ
//! - `Member` の `active_text` / `active_voice` と `Channel::members` は常に一致する
//! - ルーム状態の変更メソッドはすべて同期的で、途中で失敗した場合は何も変更しない

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;

use super::{
    error::{RoomError, ValueObjectError},
    value_object::{ChannelId, ConnectionId, DisplayName, MessageId, RoomId, Timestamp, UserId},
};

// ========================================
// Presence
// ========================================

/// プレゼンスステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Offline => "offline",
        }
    }
}

impl FromStr for PresenceStatus {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::Dnd),
            "offline" => Ok(Self::Offline),
            other => Err(ValueObjectError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 認証済みの身元情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub status: PresenceStatus,
}

impl Identity {
    pub fn new(user_id: UserId, display_name: DisplayName) -> Self {
        Self {
            user_id,
            display_name,
            status: PresenceStatus::Online,
        }
    }
}

/// 接続レジストリに登録される接続情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    /// 現在参加しているルーム（未参加なら None）
    pub room_id: Option<RoomId>,
    pub connected_at: Timestamp,
}

impl ConnectionRecord {
    pub fn new(connection_id: ConnectionId, identity: Identity, connected_at: Timestamp) -> Self {
        Self {
            connection_id,
            identity,
            room_id: None,
            connected_at,
        }
    }
}

// ========================================
// Channel
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }
}

impl FromStr for ChannelKind {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            other => Err(ValueObjectError::InvalidChannelKind(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 永続化されるチャンネル定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDefinition {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelDefinition {
    /// 人間が付けた名前から定義を作る（ID は名前から導出）
    pub fn from_name(name: &str, kind: ChannelKind) -> Result<Self, ValueObjectError> {
        let id = ChannelId::from_name(name)?;
        Ok(Self {
            id,
            name: name.trim().to_string(),
            kind,
        })
    }
}

/// ルーム内のチャンネル（定義 + 現在のメンバー）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub definition: ChannelDefinition,
    /// 参加順に並んだメンバー
    members: Vec<ConnectionId>,
}

impl Channel {
    pub fn new(definition: ChannelDefinition) -> Self {
        Self {
            definition,
            members: Vec::new(),
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.definition.id
    }

    pub fn kind(&self) -> ChannelKind {
        self.definition.kind
    }

    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    pub fn summary(&self) -> ChannelSummary {
        ChannelSummary {
            id: self.definition.id.clone(),
            name: self.definition.name.clone(),
            kind: self.definition.kind,
            member_count: self.members.len(),
        }
    }

    fn add(&mut self, connection_id: ConnectionId) {
        if !self.contains(&connection_id) {
            self.members.push(connection_id);
        }
    }

    fn remove(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|id| id != connection_id);
        self.members.len() != before
    }
}

/// チャンネル一覧の 1 行（メンバー数付き）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub member_count: usize,
}

// ========================================
// Member
// ========================================

/// ルームに参加している接続
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    pub joined_at: Timestamp,
    pub active_text: Option<ChannelId>,
    pub active_voice: Option<ChannelId>,
    /// 閲覧中のスレッドの親メッセージ
    pub open_thread: Option<MessageId>,
}

impl Member {
    pub fn new(connection_id: ConnectionId, identity: Identity, joined_at: Timestamp) -> Self {
        Self {
            connection_id,
            identity,
            joined_at,
            active_text: None,
            active_voice: None,
            open_thread: None,
        }
    }

    pub fn active_channel(&self, kind: ChannelKind) -> Option<&ChannelId> {
        match kind {
            ChannelKind::Text => self.active_text.as_ref(),
            ChannelKind::Voice => self.active_voice.as_ref(),
        }
    }

    fn set_active_channel(&mut self, kind: ChannelKind, channel_id: Option<ChannelId>) {
        match kind {
            ChannelKind::Text => self.active_text = channel_id,
            ChannelKind::Voice => self.active_voice = channel_id,
        }
    }
}

/// プレゼンス一覧の 1 行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceEntry {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub status: PresenceStatus,
}

impl From<&Member> for PresenceEntry {
    fn from(member: &Member) -> Self {
        Self {
            connection_id: member.connection_id.clone(),
            user_id: member.identity.user_id.clone(),
            display_name: member.identity.display_name.clone(),
            status: member.identity.status,
        }
    }
}

// ========================================
// Message
// ========================================

/// 添付ファイルの既定名
pub const DEFAULT_ATTACHMENT_NAME: &str = "file";

/// 添付ファイルの既定 MIME タイプ
pub const DEFAULT_ATTACHMENT_MIME: &str = "application/octet-stream";

/// クライアントから受け取った型の緩い添付ファイル情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAttachment {
    pub url: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub size: u64,
}

/// 添付ファイル記述子（実体のアップロードは外部で行われる）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl Attachment {
    /// 緩い入力を安全な型に揃える。URL が無い添付は捨てる
    pub fn sanitize(raw: RawAttachment, max_name_len: usize) -> Option<Self> {
        let url = raw.url.filter(|url| !url.trim().is_empty())?;
        let name = raw
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string())
            .chars()
            .take(max_name_len)
            .collect();
        let mime_type = raw
            .mime_type
            .filter(|mime| !mime.is_empty())
            .unwrap_or_else(|| DEFAULT_ATTACHMENT_MIME.to_string());

        Some(Self {
            url,
            name,
            mime_type,
            size: raw.size,
        })
    }
}

/// 永続化されたメッセージ
///
/// `reply_to` が設定されているものは返信であり、チャンネルのメインフィードには流れません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: DisplayName,
    pub text: String,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<MessageId>,
    pub created_at: Timestamp,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// 絵文字ごとのリアクション集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReactionSummary {
    pub count: usize,
    pub users: Vec<UserId>,
}

/// emoji → 集計
pub type ReactionMap = BTreeMap<String, ReactionSummary>;

/// 配信用のメッセージ（リアクション集計と返信数を解決済み）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub message: Message,
    pub reactions: ReactionMap,
    pub reply_count: usize,
}

impl MessageView {
    /// 保存直後のメッセージ（リアクション・返信なし）
    pub fn fresh(message: Message) -> Self {
        Self {
            message,
            reactions: ReactionMap::new(),
            reply_count: 0,
        }
    }
}

// ========================================
// Room
// ========================================

/// チャンネル参加の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelJoin {
    pub channel_id: ChannelId,
    pub kind: ChannelKind,
    /// 同じ種類のチャンネルから抜けた場合、そのチャンネル
    pub left: Option<ChannelId>,
    /// 参加前からチャンネルにいたメンバー（参加順）
    pub others: Vec<ConnectionId>,
    /// すでに同じチャンネルに参加していた
    pub already_member: bool,
}

/// ルームからの退出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub member: Member,
    /// 退出に伴い抜けたチャンネル（text, voice の順）
    pub left_channels: Vec<ChannelId>,
}

/// ルームのスナップショット（参加時の room-info や HTTP API で使用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub created_at: Timestamp,
    pub channels: Vec<ChannelSummary>,
    pub users: Vec<PresenceEntry>,
}

/// ルーム一覧の 1 行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub created_at: Timestamp,
    pub channel_count: usize,
    pub connected_count: usize,
}

/// ルーム
///
/// チャンネルレジストリとプレゼンス一覧を保持します。
/// 1 つのルームは 1 つの Mutex で保護され、以下のメソッドはその中で呼び出されます。
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub created_at: Timestamp,
    /// 作成順に並んだチャンネル
    channels: Vec<Channel>,
    /// 参加順に並んだメンバー
    members: Vec<Member>,
    /// 永続化済みのチャンネル定義を読み込み済みか
    bootstrapped: bool,
    /// ルームテーブルから取り除かれたか
    evicted: bool,
}

impl Room {
    pub fn new(id: RoomId, created_at: Timestamp) -> Self {
        Self {
            id,
            created_at,
            channels: Vec::new(),
            members: Vec::new(),
            bootstrapped: false,
            evicted: false,
        }
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// 永続化済みのチャンネル定義でチャンネルレジストリを初期化する
    pub fn seed_channels(&mut self, definitions: Vec<ChannelDefinition>) {
        for definition in definitions {
            if self.channel(&definition.id).is_none() {
                self.channels.push(Channel::new(definition));
            }
        }
        self.bootstrapped = true;
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    pub fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            created_at: self.created_at,
            channels: self.channel_summaries(),
            users: self.presence(),
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id.clone(),
            created_at: self.created_at,
            channel_count: self.channels.len(),
            connected_count: self.members.len(),
        }
    }

    // ---------- channels ----------

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, channel_id: &ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id() == channel_id)
    }

    fn channel_mut(&mut self, channel_id: &ChannelId) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id() == channel_id)
    }

    pub fn add_channel(&mut self, definition: ChannelDefinition) -> Result<(), RoomError> {
        if self.channel(&definition.id).is_some() {
            return Err(RoomError::DuplicateChannel(definition.id.into_string()));
        }
        self.channels.push(Channel::new(definition));
        Ok(())
    }

    pub fn channel_summaries(&self) -> Vec<ChannelSummary> {
        self.channels.iter().map(Channel::summary).collect()
    }

    pub fn channel_member_ids(&self, channel_id: &ChannelId) -> Vec<ConnectionId> {
        self.channel(channel_id)
            .map(|c| c.members().to_vec())
            .unwrap_or_default()
    }

    // ---------- members ----------

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, connection_id: &ConnectionId) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| &m.connection_id == connection_id)
    }

    fn member_mut(&mut self, connection_id: &ConnectionId) -> Option<&mut Member> {
        self.members
            .iter_mut()
            .find(|m| &m.connection_id == connection_id)
    }

    pub fn presence(&self) -> Vec<PresenceEntry> {
        self.members.iter().map(PresenceEntry::from).collect()
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.iter().map(|m| m.connection_id.clone()).collect()
    }

    pub fn member_ids_except(&self, connection_id: &ConnectionId) -> Vec<ConnectionId> {
        self.members
            .iter()
            .filter(|m| &m.connection_id != connection_id)
            .map(|m| m.connection_id.clone())
            .collect()
    }

    /// いずれかのスレッドを開いているメンバー
    pub fn thread_viewers(&self) -> Vec<ConnectionId> {
        self.members
            .iter()
            .filter(|m| m.open_thread.is_some())
            .map(|m| m.connection_id.clone())
            .collect()
    }

    pub fn add_member(&mut self, member: Member) -> Result<(), RoomError> {
        if self.member(&member.connection_id).is_some() {
            return Err(RoomError::DuplicateMember(
                member.connection_id.into_string(),
            ));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn set_status(
        &mut self,
        connection_id: &ConnectionId,
        status: PresenceStatus,
    ) -> Result<(), RoomError> {
        let member = self
            .member_mut(connection_id)
            .ok_or_else(|| RoomError::MemberNotFound(connection_id.to_string()))?;
        member.identity.status = status;
        Ok(())
    }

    pub fn set_open_thread(
        &mut self,
        connection_id: &ConnectionId,
        parent_id: Option<MessageId>,
    ) -> Result<(), RoomError> {
        let member = self
            .member_mut(connection_id)
            .ok_or_else(|| RoomError::MemberNotFound(connection_id.to_string()))?;
        member.open_thread = parent_id;
        Ok(())
    }

    /// チャンネルに参加する
    ///
    /// 同じ種類のチャンネルにすでに参加していれば、そちらから抜けてから参加します。
    /// 同じチャンネルへの再参加はメンバーシップを変更しません。
    pub fn join_channel(
        &mut self,
        connection_id: &ConnectionId,
        channel_id: &ChannelId,
    ) -> Result<ChannelJoin, RoomError> {
        let channel = self
            .channel(channel_id)
            .ok_or_else(|| RoomError::ChannelNotFound(channel_id.to_string()))?;
        let kind = channel.kind();
        let others: Vec<ConnectionId> = channel
            .members()
            .iter()
            .filter(|id| *id != connection_id)
            .cloned()
            .collect();

        let member = self
            .member(connection_id)
            .ok_or_else(|| RoomError::MemberNotFound(connection_id.to_string()))?;
        let previous = member.active_channel(kind).cloned();

        if previous.as_ref() == Some(channel_id) {
            return Ok(ChannelJoin {
                channel_id: channel_id.clone(),
                kind,
                left: None,
                others,
                already_member: true,
            });
        }

        // ここから先は失敗しない
        if let Some(previous) = &previous
            && let Some(old) = self.channel_mut(previous)
        {
            old.remove(connection_id);
        }
        if let Some(channel) = self.channel_mut(channel_id) {
            channel.add(connection_id.clone());
        }
        if let Some(member) = self.member_mut(connection_id) {
            member.set_active_channel(kind, Some(channel_id.clone()));
        }

        Ok(ChannelJoin {
            channel_id: channel_id.clone(),
            kind,
            left: previous,
            others,
            already_member: false,
        })
    }

    /// チャンネルから抜ける。参加していなければ何もせず `false` を返す
    pub fn leave_channel(&mut self, connection_id: &ConnectionId, channel_id: &ChannelId) -> bool {
        let Some(kind) = self.channel(channel_id).map(Channel::kind) else {
            return false;
        };
        let Some(member) = self.member_mut(connection_id) else {
            return false;
        };
        if member.active_channel(kind) != Some(channel_id) {
            return false;
        }
        member.set_active_channel(kind, None);

        if let Some(channel) = self.channel_mut(channel_id) {
            channel.remove(connection_id);
        }
        true
    }

    /// メンバーをルームから取り除く（参加中のチャンネルからも抜ける）
    pub fn remove_member(&mut self, connection_id: &ConnectionId) -> Option<Departure> {
        let index = self
            .members
            .iter()
            .position(|m| &m.connection_id == connection_id)?;
        let member = self.members.remove(index);

        let mut left_channels = Vec::new();
        for channel_id in [&member.active_text, &member.active_voice]
            .into_iter()
            .flatten()
        {
            if let Some(channel) = self.channel_mut(channel_id)
                && channel.remove(connection_id)
            {
                left_channels.push(channel_id.clone());
            }
        }

        Some(Departure {
            member,
            left_channels,
        })
    }
}
