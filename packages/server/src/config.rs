//! Runtime limits and timeouts.

use std::time::Duration;

use crate::domain::ChannelKind;

/// Server configuration shared by all use cases.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound for every call into the persistence collaborator
    pub store_timeout: Duration,
    /// Number of main-feed messages returned on text channel join
    pub history_limit: usize,
    /// Maximum message length in characters
    pub max_message_len: usize,
    /// Maximum attachment name length in characters
    pub max_attachment_name_len: usize,
    /// Channels seeded into a room that has no persisted definitions
    pub default_channels: Vec<(String, ChannelKind)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            history_limit: 50,
            max_message_len: 500,
            max_attachment_name_len: 120,
            default_channels: vec![
                ("general".to_string(), ChannelKind::Text),
                ("voice-1".to_string(), ChannelKind::Voice),
            ],
        }
    }
}
