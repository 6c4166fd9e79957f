//! Domain models for droidrelay.
//!
//! Canonical definitions for the core entities:
//! - `Message` / `Role`: conversation turns and their visibility
//! - `ToolCommand`: a routable instruction extracted from completion text
//! - `CommandResult`: the captured outcome of a host process

pub mod command;
pub mod error;
pub mod message;

// Re-export main types and errors
pub use command::{normalize_name, CommandResult, ToolCommand, LAUNCH_FAILURE_EXIT_CODE};
pub use error::{AgentError, CommandError, Result};
pub use message::{Message, Role};
