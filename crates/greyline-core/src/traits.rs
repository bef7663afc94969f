//! Trait seams shared across crates.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelKind, MessageStyle};

/// One outbound notification channel.
///
/// Implementations make exactly one network call per `send`, convert all
/// failures into `AgentError::Channel`, and never retry internally —
/// retry policy belongs to the dispatcher.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Which channel this client serves.
    fn kind(&self) -> ChannelKind;

    /// Deliver one message. Blocking up to the client's short timeout.
    async fn send(&self, text: &str, style: MessageStyle) -> Result<()>;
}
