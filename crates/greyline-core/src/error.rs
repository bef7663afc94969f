//! Greyline error type.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AgentError>;

/// All expected failure modes across the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration problems: missing credentials, malformed settings.
    #[error("config error: {0}")]
    Config(String),

    /// Transport-level channel failures: network, timeout, non-2xx, bad body.
    #[error("channel error: {0}")]
    Channel(String),

    /// Every channel in the try-order was exhausted, or none was configured.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// Background task problems: queue full, unknown kind, handler failure.
    #[error("task error: {0}")]
    Task(String),

    /// Action-level failures surfaced by the registry.
    #[error("action error: {0}")]
    Action(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
