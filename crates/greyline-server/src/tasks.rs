//! Task data model for background work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of background work. Immutable once constructed; all mutation
/// happens to the holding queue, never the item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Open-ended string tag selecting the handler.
    pub kind: String,
    /// Human label.
    pub name: String,
    /// Passed through opaquely to the handler.
    #[serde(default)]
    pub pipeline_override: Map<String, Value>,
    /// Caller-side data captured at submission time.
    #[serde(default)]
    pub context_data: Map<String, Value>,
}

impl TaskRequest {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            pipeline_override: Map::new(),
            context_data: Map::new(),
        }
    }

    pub fn with_override(mut self, pipeline_override: Map<String, Value>) -> Self {
        self.pipeline_override = pipeline_override;
        self
    }

    pub fn with_context(mut self, context_data: Map<String, Value>) -> Self {
        self.context_data = context_data;
        self
    }
}

/// Recorded result of one processed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Derived id: `<kind>_<processed-count>`.
    pub id: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub request: TaskRequest,
}

/// Point-in-time server status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub uptime_secs: f64,
    pub queue_depth: usize,
    pub tasks_processed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub last_task_at: Option<DateTime<Utc>>,
}
