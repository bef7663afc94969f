//! Dispatch-with-fallback — try channels in deterministic order until one
//! succeeds or all are exhausted.

use std::sync::Arc;

use greyline_core::{ChannelClient, ChannelKind, MessageStyle, NotifyStore};

use crate::telegram::TelegramClient;
use crate::wechat::WeChatClient;

/// What one dispatch attempt did.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Channel that accepted the message, when any did.
    pub delivered: Option<ChannelKind>,
    /// Channels tried, in order.
    pub attempted: Vec<ChannelKind>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> bool {
        self.delivered.is_some()
    }
}

/// Fallback dispatcher over the configured channel clients.
pub struct Dispatcher {
    store: Arc<NotifyStore>,
    clients: Vec<Arc<dyn ChannelClient>>,
}

impl Dispatcher {
    /// Dispatcher over the real Telegram and WeChat clients.
    pub fn new(store: Arc<NotifyStore>) -> Self {
        let clients: Vec<Arc<dyn ChannelClient>> = vec![
            Arc::new(TelegramClient::new(store.clone())),
            Arc::new(WeChatClient::new(store.clone())),
        ];
        Self { store, clients }
    }

    /// Dispatcher over injected clients. Test seam.
    pub fn with_clients(store: Arc<NotifyStore>, clients: Vec<Arc<dyn ChannelClient>>) -> Self {
        Self { store, clients }
    }

    /// Resolve the try-order: preferred channel first when configured, then
    /// the remaining configured channels in the store's stable enumeration
    /// order, each at most once. Reproducible for fixed config + preference.
    pub fn try_order(&self, preferred: Option<ChannelKind>) -> Vec<ChannelKind> {
        let mut order = Vec::with_capacity(ChannelKind::ALL.len());
        if let Some(kind) = preferred {
            if self.store.is_configured(kind) {
                order.push(kind);
            }
        }
        for kind in self.store.available_channels() {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        order
    }

    /// Send `text` through the first channel that accepts it.
    ///
    /// No channels configured is a terminal, non-retryable condition:
    /// the report comes back with zero attempts.
    pub async fn dispatch(
        &self,
        text: &str,
        style: MessageStyle,
        preferred: Option<ChannelKind>,
    ) -> DispatchReport {
        let order = self.try_order(preferred);
        if order.is_empty() {
            tracing::warn!("notification dropped: no channel configured");
            return DispatchReport { delivered: None, attempted: Vec::new() };
        }

        let mut attempted = Vec::with_capacity(order.len());
        for kind in order {
            let Some(client) = self.clients.iter().find(|c| c.kind() == kind) else {
                continue;
            };
            attempted.push(kind);
            match client.send(text, style).await {
                Ok(()) => {
                    tracing::info!("notification delivered via {kind}");
                    return DispatchReport { delivered: Some(kind), attempted };
                }
                Err(e) => {
                    tracing::warn!("send via {kind} failed: {e}; trying next channel");
                }
            }
        }

        tracing::warn!("notification failed on all {} channel(s)", attempted.len());
        DispatchReport { delivered: None, attempted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use greyline_core::error::{AgentError, Result};
    use std::sync::Mutex;

    /// Scripted stand-in for a channel client, recording calls into a
    /// shared log so cross-channel ordering is observable.
    struct StubClient {
        kind: ChannelKind,
        ok: bool,
        log: Arc<Mutex<Vec<ChannelKind>>>,
    }

    #[async_trait]
    impl ChannelClient for StubClient {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, _text: &str, _style: MessageStyle) -> Result<()> {
            self.log.lock().unwrap().push(self.kind);
            if self.ok {
                Ok(())
            } else {
                Err(AgentError::Channel("stubbed failure".into()))
            }
        }
    }

    fn dispatcher(
        store: Arc<NotifyStore>,
        telegram_ok: bool,
        wechat_ok: bool,
    ) -> (Dispatcher, Arc<Mutex<Vec<ChannelKind>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let clients: Vec<Arc<dyn ChannelClient>> = vec![
            Arc::new(StubClient { kind: ChannelKind::Telegram, ok: telegram_ok, log: log.clone() }),
            Arc::new(StubClient { kind: ChannelKind::WeChat, ok: wechat_ok, log: log.clone() }),
        ];
        (Dispatcher::with_clients(store, clients), log)
    }

    #[tokio::test]
    async fn test_no_channels_configured_makes_zero_calls() {
        let store = Arc::new(NotifyStore::new());
        let (d, log) = dispatcher(store, true, true);
        let report = d.dispatch("msg", MessageStyle::Text, None).await;
        assert!(!report.succeeded());
        assert!(report.attempted.is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preference_for_unconfigured_channel_is_ignored() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T", "C");
        let (d, log) = dispatcher(store, true, true);
        let report = d
            .dispatch("msg", MessageStyle::Text, Some(ChannelKind::WeChat))
            .await;
        assert_eq!(report.delivered, Some(ChannelKind::Telegram));
        assert_eq!(*log.lock().unwrap(), vec![ChannelKind::Telegram]);
    }

    #[tokio::test]
    async fn test_fallback_order_preferred_first() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T", "C");
        store.set_wechat("W");
        // Telegram fails, wechat succeeds.
        let (d, log) = dispatcher(store, false, true);
        let report = d
            .dispatch("msg", MessageStyle::Text, Some(ChannelKind::Telegram))
            .await;
        assert_eq!(report.delivered, Some(ChannelKind::WeChat));
        assert_eq!(
            *log.lock().unwrap(),
            vec![ChannelKind::Telegram, ChannelKind::WeChat]
        );
        assert_eq!(report.attempted, vec![ChannelKind::Telegram, ChannelKind::WeChat]);
    }

    #[tokio::test]
    async fn test_first_success_stops_iteration() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T", "C");
        store.set_wechat("W");
        let (d, log) = dispatcher(store, true, true);
        let report = d
            .dispatch("msg", MessageStyle::Text, Some(ChannelKind::Telegram))
            .await;
        assert_eq!(report.delivered, Some(ChannelKind::Telegram));
        assert_eq!(*log.lock().unwrap(), vec![ChannelKind::Telegram]);
    }

    #[tokio::test]
    async fn test_all_channels_exhausted_is_failure() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T", "C");
        store.set_wechat("W");
        let (d, _log) = dispatcher(store, false, false);
        let report = d.dispatch("msg", MessageStyle::Text, None).await;
        assert!(!report.succeeded());
        assert_eq!(report.attempted.len(), 2);
    }

    #[tokio::test]
    async fn test_try_order_is_deterministic() {
        let store = Arc::new(NotifyStore::new());
        store.set_telegram("T", "C");
        store.set_wechat("W");
        let (d, _) = dispatcher(store, true, true);
        for _ in 0..3 {
            assert_eq!(
                d.try_order(Some(ChannelKind::WeChat)),
                vec![ChannelKind::WeChat, ChannelKind::Telegram]
            );
            assert_eq!(
                d.try_order(None),
                vec![ChannelKind::Telegram, ChannelKind::WeChat]
            );
        }
    }
}
