//! droidrelay Core Library
//!
//! Turns free-form completion-service replies into tool commands, routes them
//! to handlers, runs host processes and keeps the dual-channel conversation.

pub mod classifier;
pub mod config;
pub mod conversation;
pub mod diagnostics;
pub mod domain;
pub mod fakes;
pub mod obs;
pub mod process;
pub mod router;
pub mod secrets;
pub mod session;
pub mod shell_tool;
pub mod telemetry;

pub use classifier::{classify, Classification, TOOL_MARKER};

pub use config::{AgentConfig, ShellConfig, DEFAULT_SYSTEM_PROMPT};

pub use conversation::ConversationStore;

pub use diagnostics::{explain, explain_result, Outcome};

pub use domain::{
    normalize_name, AgentError, CommandError, CommandResult, Message, Result, Role, ToolCommand,
    LAUNCH_FAILURE_EXIT_CODE,
};

pub use process::{shell_quote, CommandExecutor, ShellExecutor};

pub use router::{CommandHandler, CommandRouter, HandlerOutput, RouteOutcome};

pub use secrets::{EnvSecretProvider, SecretProvider};

pub use session::{Agent, CompletionService, RoutedCommand, TurnReport};

pub use shell_tool::ShellCommandHandler;

pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
