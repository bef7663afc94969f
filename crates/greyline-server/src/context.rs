//! Agent context — the one explicit context object constructed at startup
//! and passed by reference to whatever needs it. No module-level state.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use greyline_channels::Dispatcher;
use greyline_core::{NotifyStore, PipelineDetail, Result, ServerSettings, TaskCounter};

use crate::handlers;
use crate::server::TaskServer;

/// Collaborator boundary: runs a named pipeline entry with an override map
/// and reports the result. The external framework stays on the far side of
/// this callback.
pub type PipelineRunner =
    Arc<dyn Fn(String, Value) -> BoxFuture<'static, Result<PipelineDetail>> + Send + Sync>;

/// Everything actions need, threaded explicitly.
pub struct AgentContext {
    pub store: Arc<NotifyStore>,
    pub counter: Arc<TaskCounter>,
    pub dispatcher: Arc<Dispatcher>,
    pub server: Arc<TaskServer>,
    pub pipeline: Option<PipelineRunner>,
}

impl AgentContext {
    /// Wire up the standard context: real channel clients behind the
    /// dispatcher and the built-in task handlers behind the server.
    pub fn new(store: Arc<NotifyStore>, settings: ServerSettings) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(store.clone()));
        let server = Arc::new(TaskServer::new(
            settings,
            store.clone(),
            handlers::builtin_handlers(),
        ));
        Self {
            store,
            counter: Arc::new(TaskCounter::new()),
            dispatcher,
            server,
            pipeline: None,
        }
    }

    /// Install the pipeline runner callback.
    pub fn with_pipeline(mut self, runner: PipelineRunner) -> Self {
        self.pipeline = Some(runner);
        self
    }
}
