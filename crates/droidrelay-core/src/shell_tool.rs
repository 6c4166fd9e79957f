//! `execute_shell_command` handler.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::diagnostics;
use crate::domain::ToolCommand;
use crate::process::CommandExecutor;
use crate::router::{CommandHandler, HandlerOutput};

/// Lines of stdout echoed into the visible summary.
const VISIBLE_TAIL_LINES: usize = 20;

/// Runs an arbitrary host command through a [`CommandExecutor`].
pub struct ShellCommandHandler {
    executor: Arc<dyn CommandExecutor>,
}

impl ShellCommandHandler {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl CommandHandler for ShellCommandHandler {
    fn name(&self) -> &'static str {
        "execute_shell_command"
    }

    fn synonyms(&self) -> &'static [&'static str] {
        &["run_shell_command", "shell", "execute_command", "run_command"]
    }

    fn required_arguments(&self) -> &'static [&'static str] {
        &["command"]
    }

    async fn handle(&self, command: &ToolCommand, cancel: &CancellationToken) -> HandlerOutput {
        let Some(line) = command.str_arg("command") else {
            return HandlerOutput::visible("No command given.");
        };
        let working_dir = command.str_arg("workingDirectory").map(PathBuf::from);

        let result = self
            .executor
            .run(&line, working_dir.as_deref(), cancel)
            .await;

        let mut summary = format!("Command `{line}` finished with exit code {}.", result.exit_code);
        let tail = result.stdout_tail(VISIBLE_TAIL_LINES);
        if !tail.is_empty() {
            summary.push_str(&format!("\n```\n{tail}\n```"));
        }
        if !result.success() {
            summary.push('\n');
            summary.push_str(&diagnostics::explain_result(&result, false));
        }

        HandlerOutput::visible(summary)
            .with_hidden(format!("$ {line}\n{}", result.to_formatted_string()))
    }
}
