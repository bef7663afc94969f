//! # Greyline Core
//!
//! Shared foundation for the Greyline agent: error type, notification
//! configuration store, message templating, and the channel trait.
//!
//! ## Design Principles
//! - Configuration is explicit state passed by reference — no process-wide
//!   singletons, no hidden globals.
//! - Expected failures (unreachable channel, bad config) are values, not
//!   panics: every public operation returns a `Result` or a boolean.
//! - The flat `agent.conf` credential file fails soft: a missing or broken
//!   file leaves prior in-memory state untouched.

pub mod config;
pub mod counter;
pub mod error;
pub mod param;
pub mod template;
pub mod traits;
pub mod types;

pub use config::{AgentSettings, NotifyStore, ServerSettings};
pub use counter::TaskCounter;
pub use error::{AgentError, Result};
pub use param::{ActionParam, StructuredParam};
pub use template::render;
pub use traits::ChannelClient;
pub use types::{ChannelKind, MessageStyle, PipelineDetail};
