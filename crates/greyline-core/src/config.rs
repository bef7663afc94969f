//! Agent configuration.
//!
//! Two layers, mirroring how the agent is deployed:
//! - `NotifyStore` — notification credentials from the flat `agent.conf`
//!   file (`KEY=VALUE` lines). Loaded once at startup, optionally overridden
//!   programmatically from a single control thread.
//! - `AgentSettings` — operational knobs from `greyline.toml`.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::types::ChannelKind;

/// Watchdog interval bounds, in seconds. Values outside fall back to the
/// default with a warning rather than failing the load.
const WD_INTERVAL_MIN: f64 = 0.5;
const WD_INTERVAL_MAX: f64 = 3600.0;
const WD_INTERVAL_DEFAULT: f64 = 5.0;

#[derive(Debug, Clone, Default)]
struct NotifyState {
    bot_token: Option<String>,
    chat_id: Option<String>,
    webhook_key: Option<String>,
    default_channel: Option<ChannelKind>,
    watchdog_interval: Option<f64>,
}

/// Notification configuration store.
///
/// A channel counts as configured iff all of its required fields are set
/// (Telegram: token + chat id, WeChat: webhook key). Read-mostly after
/// startup; the interior lock covers the stated single-writer usage.
pub struct NotifyStore {
    state: RwLock<NotifyState>,
}

impl NotifyStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(NotifyState::default()),
        }
    }

    /// Default credential file path (~/.greyline/agent.conf).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".greyline")
            .join("agent.conf")
    }

    /// Load `KEY=VALUE` pairs from a flat text file.
    ///
    /// Lines starting with `#`, blank lines, and lines without `=` are
    /// skipped. Unknown keys are ignored. Fails soft: a missing or
    /// unreadable file returns `false` and leaves prior state untouched.
    /// Returns whether at least one channel ended up configured.
    pub fn load(&self, path: &Path) -> bool {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("cannot read {}: {e} — keeping prior config", path.display());
                return false;
            }
        };

        let mut state = self.state.write().expect("notify store lock poisoned");
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "Bot_Token" => state.bot_token = non_empty(value),
                "Chat_ID" => state.chat_id = non_empty(value),
                "Webhook_Key" => state.webhook_key = non_empty(value),
                "Default_ExtNotify" => {
                    state.default_channel = ChannelKind::parse(value);
                    if state.default_channel.is_none() {
                        tracing::warn!(
                            "invalid Default_ExtNotify '{value}', expected telegram or wechat"
                        );
                    }
                }
                "WD_Interval" => state.watchdog_interval = parse_watchdog_interval(value),
                _ => {}
            }
        }

        let configured = telegram_of(&state).is_some() || wechat_of(&state).is_some();
        tracing::info!(
            "loaded {}: telegram={}, wechat={}, default={:?}",
            path.display(),
            telegram_of(&state).is_some(),
            wechat_of(&state).is_some(),
            state.default_channel,
        );
        configured
    }

    /// Telegram credentials, if fully configured.
    pub fn telegram_config(&self) -> Option<(String, String)> {
        let state = self.state.read().expect("notify store lock poisoned");
        telegram_of(&state)
    }

    /// WeChat Work webhook key, if configured.
    pub fn wechat_config(&self) -> Option<String> {
        let state = self.state.read().expect("notify store lock poisoned");
        wechat_of(&state)
    }

    /// Whether a given channel is presently configured.
    pub fn is_configured(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Telegram => self.telegram_config().is_some(),
            ChannelKind::WeChat => self.wechat_config().is_some(),
        }
    }

    /// Configured channels in stable enumeration order, evaluated fresh.
    pub fn available_channels(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|k| self.is_configured(*k))
            .collect()
    }

    /// The validated preferred channel. When the preference is unset or
    /// names an unconfigured channel, auto-select: wechat before telegram.
    pub fn default_channel(&self) -> Option<ChannelKind> {
        let preferred = self.state.read().expect("notify store lock poisoned").default_channel;
        if let Some(kind) = preferred {
            if self.is_configured(kind) {
                return Some(kind);
            }
        }
        if self.is_configured(ChannelKind::WeChat) {
            Some(ChannelKind::WeChat)
        } else if self.is_configured(ChannelKind::Telegram) {
            Some(ChannelKind::Telegram)
        } else {
            None
        }
    }

    /// Watchdog (heartbeat) interval in seconds.
    pub fn watchdog_interval(&self) -> f64 {
        self.state
            .read()
            .expect("notify store lock poisoned")
            .watchdog_interval
            .unwrap_or(WD_INTERVAL_DEFAULT)
    }

    pub fn set_telegram(&self, bot_token: &str, chat_id: &str) {
        let mut state = self.state.write().expect("notify store lock poisoned");
        state.bot_token = non_empty(bot_token);
        state.chat_id = non_empty(chat_id);
    }

    pub fn set_wechat(&self, webhook_key: &str) {
        let mut state = self.state.write().expect("notify store lock poisoned");
        state.webhook_key = non_empty(webhook_key);
    }

    /// Set the preferred channel. Invalid platform names are rejected.
    pub fn set_default_channel(&self, platform: &str) -> Result<()> {
        let kind = ChannelKind::parse(platform)
            .ok_or_else(|| AgentError::Config(format!("unknown platform '{platform}'")))?;
        self.state.write().expect("notify store lock poisoned").default_channel = Some(kind);
        Ok(())
    }

    pub fn set_watchdog_interval(&self, secs: f64) -> Result<()> {
        if !(WD_INTERVAL_MIN..=WD_INTERVAL_MAX).contains(&secs) {
            return Err(AgentError::Config(format!(
                "watchdog interval {secs}s out of range [{WD_INTERVAL_MIN}, {WD_INTERVAL_MAX}]"
            )));
        }
        self.state.write().expect("notify store lock poisoned").watchdog_interval = Some(secs);
        Ok(())
    }
}

impl Default for NotifyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() { None } else { Some(value.to_string()) }
}

fn telegram_of(state: &NotifyState) -> Option<(String, String)> {
    match (&state.bot_token, &state.chat_id) {
        (Some(token), Some(chat)) => Some((token.clone(), chat.clone())),
        _ => None,
    }
}

fn wechat_of(state: &NotifyState) -> Option<String> {
    state.webhook_key.clone()
}

fn parse_watchdog_interval(value: &str) -> Option<f64> {
    let secs: f64 = match value.parse() {
        Ok(s) => s,
        Err(_) => {
            tracing::warn!("invalid WD_Interval '{value}', using default {WD_INTERVAL_DEFAULT}s");
            return None;
        }
    };
    if !(WD_INTERVAL_MIN..=WD_INTERVAL_MAX).contains(&secs) {
        tracing::warn!(
            "WD_Interval {secs}s out of range [{WD_INTERVAL_MIN}, {WD_INTERVAL_MAX}], \
             using default {WD_INTERVAL_DEFAULT}s"
        );
        return None;
    }
    Some(secs)
}

/// Operational settings (greyline.toml).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSettings {
    #[serde(default)]
    pub server: ServerSettings,
}

impl AgentSettings {
    /// Load settings from a TOML file, or defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("failed to read settings: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AgentError::Config(format!("failed to parse settings: {e}")))
    }

    /// Default settings path (~/.greyline/greyline.toml).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".greyline")
            .join("greyline.toml")
    }
}

/// Background task server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Worker poll interval between empty-queue checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum queued requests; submits beyond this are rejected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Ring buffer size for recorded task outcomes.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Emit a periodic heartbeat log line while running.
    #[serde(default = "bool_true")]
    pub heartbeat: bool,
    /// Bounded join timeout on shutdown, in seconds.
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_queue_capacity() -> usize {
    256
}
fn default_history_size() -> usize {
    64
}
fn bool_true() -> bool {
    true
}
fn default_join_timeout_secs() -> u64 {
    3
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            queue_capacity: default_queue_capacity(),
            history_size: default_history_size(),
            heartbeat: bool_true(),
            join_timeout_secs: default_join_timeout_secs(),
        }
    }
}
