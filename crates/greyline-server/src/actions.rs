//! Custom actions — the handlers the framework invokes by name with an
//! opaque parameter, and the one-time registry that owns them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Value, json};

use greyline_core::error::{AgentError, Result};
use greyline_core::{ActionParam, MessageStyle, render};

use crate::context::AgentContext;
use crate::tasks::TaskRequest;

/// Pipeline entry started by the grey-zone action.
pub const GREY_ZONE_ENTRY: &str = "GreyZoneFarm";

/// One registered action. The registry converts errors to a boolean at the
/// framework boundary; nothing propagates past it.
#[async_trait]
pub trait CustomAction: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &AgentContext, param: ActionParam) -> Result<()>;
}

/// Name → action map, built once at process start.
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn CustomAction>>,
}

impl ActionRegistry {
    pub fn new(actions: Vec<Arc<dyn CustomAction>>) -> Self {
        let actions: HashMap<String, Arc<dyn CustomAction>> = actions
            .into_iter()
            .map(|a| (a.name().to_string(), a))
            .collect();
        tracing::info!("action registry: {} action(s)", actions.len());
        Self { actions }
    }

    /// Registry with all built-in actions.
    pub fn with_builtins() -> Self {
        Self::new(vec![
            Arc::new(ExtNotifyAction),
            Arc::new(ServerHelloAction),
            Arc::new(ServerStatusAction),
            Arc::new(GreyZoneRunAction),
        ])
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invoke an action by name with the raw framework parameter.
    /// This is the whole inbound surface: parse once, run, report success.
    pub async fn invoke(&self, ctx: &AgentContext, name: &str, raw: Option<&Value>) -> bool {
        let Some(action) = self.actions.get(name) else {
            tracing::warn!("unknown action '{name}'");
            return false;
        };
        let param = ActionParam::parse(raw);
        match action.run(ctx, param).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("action '{name}' failed: {e}");
                false
            }
        }
    }
}

/// External notification: template the message and hand it to the
/// dispatch-with-fallback chain, or log locally for `type = "log"`.
pub struct ExtNotifyAction;

#[async_trait]
impl CustomAction for ExtNotifyAction {
    fn name(&self) -> &str {
        "ext_notify"
    }

    async fn run(&self, ctx: &AgentContext, param: ActionParam) -> Result<()> {
        match param {
            ActionParam::None => Err(AgentError::Action("ext_notify requires a parameter".into())),
            ActionParam::Raw(text) => {
                let preferred = ctx.store.default_channel();
                let report = ctx.dispatcher.dispatch(&text, MessageStyle::Text, preferred).await;
                if report.succeeded() {
                    Ok(())
                } else {
                    Err(AgentError::Dispatch(format!(
                        "no channel accepted the message ({} tried)",
                        report.attempted.len()
                    )))
                }
            }
            ActionParam::Structured(p) => {
                let template = p
                    .message
                    .ok_or_else(|| AgentError::Action("ext_notify: missing message".into()))?;
                let text = render(&template, &p.parameters, &ctx.counter);

                if p.kind.as_deref() == Some("log") {
                    tracing::info!("[notify] {text}");
                    return Ok(());
                }

                // Explicit platform in the param wins; otherwise the store's
                // configured preference steers channel selection.
                let preferred = p.platform.or_else(|| ctx.store.default_channel());
                let report = ctx.dispatcher.dispatch(&text, p.msgtype, preferred).await;
                if report.succeeded() {
                    Ok(())
                } else {
                    Err(AgentError::Dispatch(format!(
                        "no channel accepted the message ({} tried)",
                        report.attempted.len()
                    )))
                }
            }
        }
    }
}

/// Liveness probe: logs a greeting and submits a "Hello" background task.
pub struct ServerHelloAction;

#[async_trait]
impl CustomAction for ServerHelloAction {
    fn name(&self) -> &str {
        "server.hello"
    }

    async fn run(&self, ctx: &AgentContext, _param: ActionParam) -> Result<()> {
        let now = chrono::Utc::now();
        let message = format!("hello from task server at {}", now.format("%Y-%m-%d %H:%M:%S"));
        tracing::info!("{message}");

        let mut context_data = serde_json::Map::new();
        context_data.insert("timestamp".into(), json!(now.to_rfc3339()));
        context_data.insert("message".into(), json!(message));
        let request = TaskRequest::new("Hello", "hello_task").with_context(context_data);
        if ctx.server.submit(request) {
            Ok(())
        } else {
            Err(AgentError::Task("queue full, hello task rejected".into()))
        }
    }
}

/// Logs the server status snapshot and the most recent outcomes.
pub struct ServerStatusAction;

#[async_trait]
impl CustomAction for ServerStatusAction {
    fn name(&self) -> &str {
        "server.status"
    }

    async fn run(&self, ctx: &AgentContext, _param: ActionParam) -> Result<()> {
        let status = ctx.server.status();
        let status_json = serde_json::to_string(&status)
            .map_err(|e| AgentError::Action(format!("status serialization failed: {e}")))?;
        tracing::info!("server status: {status_json}");
        for outcome in ctx.server.recent_outcomes(5) {
            tracing::info!(
                "recent outcome {}: success={} at {}",
                outcome.id,
                outcome.success,
                outcome.timestamp.to_rfc3339()
            );
        }
        Ok(())
    }
}

/// Runs the grey-zone pipeline through the collaborator callback, then
/// submits the post-processing task with the captured execution metadata.
pub struct GreyZoneRunAction;

#[async_trait]
impl CustomAction for GreyZoneRunAction {
    fn name(&self) -> &str {
        "grey_zone.run"
    }

    async fn run(&self, ctx: &AgentContext, param: ActionParam) -> Result<()> {
        let runner = ctx
            .pipeline
            .as_ref()
            .ok_or_else(|| AgentError::Action("pipeline runner not configured".into()))?;

        let override_map = match &param {
            ActionParam::Structured(p) => p.parameters.clone(),
            _ => serde_json::Map::new(),
        };

        tracing::info!("starting grey zone pipeline '{GREY_ZONE_ENTRY}'");
        let started = Instant::now();
        let result = runner(
            GREY_ZONE_ENTRY.to_string(),
            Value::Object(override_map.clone()),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut context_data = serde_json::Map::new();
        context_data.insert("timestamp".into(), json!(chrono::Utc::now().to_rfc3339()));
        context_data.insert("execution_time_ms".into(), json!(elapsed_ms));

        match result {
            Ok(detail) => {
                tracing::info!(
                    "grey zone pipeline done in {elapsed_ms}ms: entry={}, status={}, nodes={}",
                    detail.entry,
                    detail.status,
                    detail.nodes
                );
                context_data.insert("task_status".into(), json!(detail.status));
                context_data.insert("task_entry".into(), json!(detail.entry));
                context_data.insert("nodes_count".into(), json!(detail.nodes));
                let request = TaskRequest::new("GreyZonePost", "grey_zone_post")
                    .with_override(override_map)
                    .with_context(context_data);
                if !ctx.server.submit(request) {
                    tracing::warn!("post-processing task rejected, queue full");
                }
                Ok(())
            }
            Err(e) => {
                context_data.insert("error".into(), json!(e.to_string()));
                let request = TaskRequest::new("GreyZonePost", "grey_zone_error")
                    .with_override(override_map)
                    .with_context(context_data);
                if !ctx.server.submit(request) {
                    tracing::warn!("error post-processing task rejected, queue full");
                }
                Err(AgentError::Action(format!("grey zone pipeline failed: {e}")))
            }
        }
    }
}
