//! Shared value types.

use serde::{Deserialize, Serialize};

/// One external notification destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    WeChat,
}

impl ChannelKind {
    /// Stable enumeration order used everywhere a channel list is built.
    /// Availability checks and the dispatch try-order both walk this slice,
    /// so the order is reproducible for a fixed configuration.
    pub const ALL: [ChannelKind; 2] = [ChannelKind::Telegram, ChannelKind::WeChat];

    /// Parse a platform name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" => Some(ChannelKind::Telegram),
            "wechat" => Some(ChannelKind::WeChat),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Telegram => write!(f, "telegram"),
            ChannelKind::WeChat => write!(f, "wechat"),
        }
    }
}

/// Message rendering style. WeChat Work distinguishes the two in its
/// webhook body; Telegram sends plain text either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStyle {
    #[default]
    Text,
    Markdown,
}

/// Result summary of one pipeline run, as reported by the collaborator
/// framework across the callback boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDetail {
    /// Pipeline entry name that was executed.
    pub entry: String,
    /// Terminal status string as the framework reports it.
    pub status: String,
    /// Number of pipeline nodes that ran.
    #[serde(default)]
    pub nodes: usize,
}
