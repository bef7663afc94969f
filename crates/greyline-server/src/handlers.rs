//! Task handlers — one per task kind, selected by the worker.

use async_trait::async_trait;

use greyline_core::error::{AgentError, Result};

use crate::tasks::TaskRequest;

/// Handles one kind of background task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task-kind string this handler owns.
    fn kind(&self) -> &str;

    /// Process one request. Errors are recorded as failed outcomes;
    /// they never stop the worker.
    async fn run(&self, request: &TaskRequest) -> Result<()>;
}

/// Built-in handlers registered at startup.
pub fn builtin_handlers() -> Vec<std::sync::Arc<dyn TaskHandler>> {
    vec![
        std::sync::Arc::new(HelloHandler),
        std::sync::Arc::new(GreyZonePostHandler),
    ]
}

/// Liveness check task.
pub struct HelloHandler;

#[async_trait]
impl TaskHandler for HelloHandler {
    fn kind(&self) -> &str {
        "Hello"
    }

    async fn run(&self, request: &TaskRequest) -> Result<()> {
        tracing::info!(
            "hello task '{}': {}",
            request.name,
            serde_json::Value::Object(request.context_data.clone())
        );
        Ok(())
    }
}

/// Post-processing after a grey-zone pipeline run: records the execution
/// metadata the action captured (status, timing, node count).
pub struct GreyZonePostHandler;

#[async_trait]
impl TaskHandler for GreyZonePostHandler {
    fn kind(&self) -> &str {
        "GreyZonePost"
    }

    async fn run(&self, request: &TaskRequest) -> Result<()> {
        let data = &request.context_data;
        if let Some(error) = data.get("error") {
            tracing::warn!("grey zone run '{}' ended with error: {error}", request.name);
            return Err(AgentError::Task(format!("pipeline reported error: {error}")));
        }

        let status = data.get("task_status").and_then(|v| v.as_str()).unwrap_or("unknown");
        let elapsed_ms = data.get("execution_time_ms").and_then(|v| v.as_u64()).unwrap_or(0);
        tracing::info!(
            "grey zone post-processing '{}': status={status}, took {elapsed_ms}ms, override={}",
            request.name,
            serde_json::Value::Object(request.pipeline_override.clone())
        );
        Ok(())
    }
}
