//! WeChat Work webhook channel.
//!
//! The webhook reports application errors inside an HTTP 200 body, so
//! success requires both a 2xx status and `errcode == 0`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use greyline_core::error::{AgentError, Result};
use greyline_core::{ChannelClient, ChannelKind, MessageStyle, NotifyStore};

struct Connection {
    webhook_key: String,
    http: reqwest::Client,
}

/// WeChat Work (企业微信) group-robot client.
pub struct WeChatClient {
    store: Arc<NotifyStore>,
    connection: Mutex<Option<Connection>>,
    sent: AtomicU64,
}

impl WeChatClient {
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

    async fn http_for(&self, webhook_key: &str) -> Result<reqwest::Client> {
        let mut conn = self.connection.lock().await;
        match conn.as_ref() {
            Some(c) if c.webhook_key == webhook_key => Ok(c.http.clone()),
            _ => {
                conn.take();
                let http = crate::build_http()?;
                *conn = Some(Connection {
                    webhook_key: webhook_key.to_string(),
                    http: http.clone(),
                });
                Ok(http)
            }
        }
    }
}

#[async_trait]
impl ChannelClient for WeChatClient {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WeChat
    }

    async fn send(&self, text: &str, style: MessageStyle) -> Result<()> {
        let webhook_key = self
            .store
            .wechat_config()
            .ok_or_else(|| AgentError::Channel("wechat not configured".into()))?;
        let http = self.http_for(&webhook_key).await?;

        let url = format!("https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key={webhook_key}");
        let payload = match style {
            MessageStyle::Text => serde_json::json!({
                "msgtype": "text",
                "text": { "content": text },
            }),
            MessageStyle::Markdown => serde_json::json!({
                "msgtype": "markdown",
                "markdown": { "content": text },
            }),
        };

        let resp = http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::Channel(format!("wechat send failed: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        check_reply(status.as_u16(), &body)?;

        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!("wechat notification sent ({} bytes)", text.len());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Decode a webhook reply. HTTP 200 with a non-zero `errcode` is a failure.
fn check_reply(status: u16, body: &str) -> Result<()> {
    if !(200..300).contains(&status) {
        return Err(AgentError::Channel(format!(
            "wechat HTTP error {status}: {body}"
        )));
    }
    let reply: WebhookReply = serde_json::from_str(body)
        .map_err(|e| AgentError::Channel(format!("wechat reply not JSON: {e}")))?;
    if reply.errcode != 0 {
        return Err(AgentError::Channel(format!(
            "wechat errcode {}: {}",
            reply.errcode, reply.errmsg
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_200_with_nonzero_errcode_is_failure() {
        let body = r#"{"errcode": 93000, "errmsg": "invalid webhook"}"#;
        let err = check_reply(200, body).unwrap_err();
        assert!(err.to_string().contains("93000"));
        assert!(err.to_string().contains("invalid webhook"));
    }

    #[test]
    fn test_http_200_with_errcode_zero_is_success() {
        assert!(check_reply(200, r#"{"errcode": 0, "errmsg": "ok"}"#).is_ok());
    }

    #[test]
    fn test_non_2xx_is_failure() {
        assert!(check_reply(500, "oops").is_err());
    }

    #[test]
    fn test_non_json_body_is_failure() {
        assert!(check_reply(200, "<html>").is_err());
    }

    #[tokio::test]
    async fn test_send_without_config_fails() {
        let client = WeChatClient::new(Arc::new(NotifyStore::new()));
        let err = client.send("hi", MessageStyle::Text).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
        assert_eq!(client.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_rebuilt_on_key_change() {
        let store = Arc::new(NotifyStore::new());
        store.set_wechat("K1");
        let client = WeChatClient::new(store.clone());
        client.http_for("K1").await.unwrap();
        store.set_wechat("K2");
        client.http_for("K2").await.unwrap();
        let held = client.connection.lock().await.as_ref().unwrap().webhook_key.clone();
        assert_eq!(held, "K2");
    }
}
