//! Tsudoi: room/channel presence coordinator and WebRTC signaling relay.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
