//! # Greyline Channels
//!
//! Outbound notification channel implementations and the
//! dispatch-with-fallback policy.
//!
//! Each client owns at most one live HTTP connection pool, keyed by the
//! configuration snapshot that produced it; a config change tears the old
//! pool down before a new one is built. Message volume is low, so a single
//! pooled connection slot amortizes handshake cost.

pub mod dispatch;
pub mod telegram;
pub mod wechat;

pub use dispatch::{DispatchReport, Dispatcher};
pub use telegram::TelegramClient;
pub use wechat::WeChatClient;

/// Send timeout shared by all channel clients.
pub(crate) const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Build the single-slot HTTP client used by channel connections.
pub(crate) fn build_http() -> greyline_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .pool_max_idle_per_host(1)
        .build()
        .map_err(|e| greyline_core::AgentError::Channel(format!("http client build failed: {e}")))
}
