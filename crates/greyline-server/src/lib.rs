//! # Greyline Server
//!
//! Background task service and custom-action registry.
//!
//! ## Architecture
//! ```text
//! framework callback ("action name" + opaque param)
//!   └── ActionRegistry::invoke → parse once → CustomAction
//!         ├── ext_notify   → template → Dispatcher (fallback chain)
//!         ├── grey_zone.run → pipeline callback → submit post-task
//!         ├── server.hello  → submit "Hello" task
//!         └── server.status → log counters + recent outcomes
//!
//! TaskServer (single worker, tokio interval poll)
//!   ├── bounded FIFO queue (reject on overflow)
//!   ├── handler per task kind (unknown kind = failed outcome)
//!   ├── ring buffer of recent outcomes
//!   └── stats: processed = succeeded + failed
//! ```

pub mod actions;
pub mod context;
pub mod handlers;
pub mod server;
pub mod tasks;

pub use actions::{ActionRegistry, CustomAction, GREY_ZONE_ENTRY};
pub use context::{AgentContext, PipelineRunner};
pub use handlers::TaskHandler;
pub use server::TaskServer;
pub use tasks::{ServerStatus, TaskOutcome, TaskRequest};
