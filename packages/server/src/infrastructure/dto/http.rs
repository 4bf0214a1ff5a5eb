//! HTTP API response DTOs.

use serde::Serialize;

use super::websocket::{ChannelDto, UserDto};

/// Summary of a live room (`GET /api/rooms`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub id: String,
    pub channel_count: usize,
    pub connected_count: usize,
    /// RFC 3339 (UTC)
    pub created_at: String,
}

/// Detail of a live room (`GET /api/rooms/{room_id}`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailDto {
    pub id: String,
    pub created_at: String,
    pub channels: Vec<ChannelDto>,
    pub users: Vec<UserDto>,
}
