//! Domain-level error taxonomy for droidrelay.

/// Errors produced while turning an extracted JSON object into a [`ToolCommand`].
///
/// [`ToolCommand`]: super::ToolCommand
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("command object has no tool name (expected one of: name, tool, method, function)")]
    MissingName,

    #[error("tool name must be a non-empty string")]
    EmptyName,

    #[error("command arguments must be a JSON object, got {found}")]
    InvalidArguments { found: String },
}

/// droidrelay agent errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("completion service error: {0}")]
    Completion(String),

    #[error("invalid command: {0}")]
    Command(#[from] CommandError),

    #[error("duplicate handler name: {name}")]
    DuplicateHandler { name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for droidrelay agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
