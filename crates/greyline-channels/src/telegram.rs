//! Telegram Bot API channel — one `sendMessage` POST per notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use greyline_core::error::{AgentError, Result};
use greyline_core::{ChannelClient, ChannelKind, MessageStyle, NotifyStore};

/// Config snapshot the live connection was built from.
type Snapshot = (String, String); // (bot_token, chat_id)

struct Connection {
    snapshot: Snapshot,
    http: reqwest::Client,
}

/// Telegram channel client.
///
/// The connection is created lazily on first send and rebuilt whenever the
/// backing configuration values change; the stale pool is dropped first.
pub struct TelegramClient {
    store: Arc<NotifyStore>,
    connection: Mutex<Option<Connection>>,
    sent: AtomicU64,
}

impl TelegramClient {
    pub fn new(store: Arc<NotifyStore>) -> Self {
        Self {
            store,
            connection: Mutex::new(None),
            sent: AtomicU64::new(0),
        }
    }

    /// Messages successfully sent by this client.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Release the live connection. Safe to call repeatedly.
    pub async fn cleanup(&self) {
        self.connection.lock().await.take();
    }

    async fn http_for(&self, snapshot: &Snapshot) -> Result<reqwest::Client> {
        let mut conn = self.connection.lock().await;
        match conn.as_ref() {
            Some(c) if &c.snapshot == snapshot => Ok(c.http.clone()),
            _ => {
                // Drop the stale pool before opening a fresh one.
                conn.take();
                let http = crate::build_http()?;
                *conn = Some(Connection {
                    snapshot: snapshot.clone(),
                    http: http.clone(),
                });
                Ok(http)
            }
        }
    }
}

#[async_trait]
impl ChannelClient for TelegramClient {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn send(&self, text: &str, _style: MessageStyle) -> Result<()> {
        let snapshot = self
            .store
            .telegram_config()
            .ok_or_else(|| AgentError::Channel("telegram not configured".into()))?;
        let http = self.http_for(&snapshot).await?;

        let (bot_token, chat_id) = &snapshot;
        let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
        let resp = http
            .post(&url)
            .form(&[("chat_id", chat_id.as_str()), ("text", text)])
            .send()
            .await
            .map_err(|e| AgentError::Channel(format!("telegram send failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            self.sent.fetch_add(1, Ordering::Relaxed);
            tracing::info!("telegram notification sent ({} bytes)", text.len());
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(AgentError::Channel(format!(
                "telegram API error {status}: {body}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_config_fails_before_any_network_call() {
        let client = TelegramClient::new(Arc::new(NotifyStore::new()));
        let err = client.send("hi", MessageStyle::Text).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert_eq!(client.sent_count(), 0);
        // No connection was built either.
        assert!(client.connection.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_connection_rebuilt_on_config_change() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T1", "C1");
        let client = TelegramClient::new(store.clone());

        let snap1 = store.telegram_config().unwrap();
        client.http_for(&snap1).await.unwrap();
        let built1 = client.connection.lock().await.as_ref().unwrap().snapshot.clone();

        store.set_telegram("T2", "C2");
        let snap2 = store.telegram_config().unwrap();
        client.http_for(&snap2).await.unwrap();
        let built2 = client.connection.lock().await.as_ref().unwrap().snapshot.clone();

        assert_ne!(built1, built2);
        assert_eq!(built2, ("T2".to_string(), "C2".to_string()));
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T", "C");
        let client = TelegramClient::new(store.clone());
        client.http_for(&store.telegram_config().unwrap()).await.unwrap();
        client.cleanup().await;
        client.cleanup().await;
        assert!(client.connection.lock().await.is_none());
    }
}
