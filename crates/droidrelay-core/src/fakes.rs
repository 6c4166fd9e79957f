//! In-memory fakes for the executor, completion and secret seams (testing only)
//!
//! Provides `RecordingExecutor`, `ScriptedCompletion`, and `MemorySecrets`
//! that satisfy the trait contracts without spawning processes or touching
//! the network.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AgentError, CommandResult, Message, Result};
use crate::process::CommandExecutor;
use crate::secrets::SecretProvider;
use crate::session::CompletionService;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// RecordingExecutor
// ---------------------------------------------------------------------------

/// One recorded `run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: String,
    pub working_dir: Option<PathBuf>,
}

/// Executor that records every command and answers from a script.
///
/// Responses are matched by substring in registration order; unmatched
/// commands succeed with empty output. A cancelled token yields the launch
/// failure sentinel and is not recorded, like the real executor.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    responses: Mutex<Vec<(String, CommandResult)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `needle` with `result`.
    pub fn respond(&self, needle: impl Into<String>, result: CommandResult) {
        lock(&self.responses).push((needle.into(), result));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.command.clone()).collect()
    }

    /// Whether any recorded command contains `needle`.
    pub fn ran(&self, needle: &str) -> bool {
        lock(&self.calls).iter().any(|c| c.command.contains(needle))
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn run(
        &self,
        command: &str,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> CommandResult {
        if cancel.is_cancelled() {
            return CommandResult::launch_failure("cancelled before launch");
        }
        lock(&self.calls).push(RecordedCall {
            command: command.to_string(),
            working_dir: working_dir.map(Path::to_path_buf),
        });
        lock(&self.responses)
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::new(0, "", ""))
    }
}

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Completion service replaying queued replies and recording each request.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::new();
        for reply in replies {
            fake.push_reply(reply);
        }
        fake
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    /// Queue a failure; the next call returns `AgentError::Completion(message)`.
    pub fn push_error(&self, message: impl Into<String>) {
        lock(&self.replies).push_back(Err(message.into()));
    }

    /// Message lists sent so far, one entry per call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn send_message(&self, messages: &[Message]) -> Result<String> {
        lock(&self.requests).push(messages.to_vec());
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AgentError::Completion(message)),
            None => Err(AgentError::Completion("no scripted reply left".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// MemorySecrets
// ---------------------------------------------------------------------------

/// Secret provider backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemorySecrets {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.values).insert(name.into(), value.into());
    }
}

impl SecretProvider for MemorySecrets {
    fn get_secret(&self, name: &str) -> Option<String> {
        lock(&self.values).get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_executor_matches_in_order() {
        let exec = RecordingExecutor::new();
        exec.respond("gradlew test", CommandResult::new(1, "", "There were failing tests"));
        exec.respond("gradlew", CommandResult::new(0, "BUILD SUCCESSFUL", ""));

        let cancel = CancellationToken::new();
        assert_eq!(exec.run("./gradlew testDebugUnitTest", None, &cancel).await.exit_code, 1);
        assert_eq!(exec.run("./gradlew assembleDebug", None, &cancel).await.exit_code, 0);
        assert_eq!(exec.run("ls", None, &cancel).await.exit_code, 0);
        assert_eq!(exec.commands().len(), 3);
    }

    #[tokio::test]
    async fn test_recording_executor_honors_cancel() {
        let exec = RecordingExecutor::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!exec.run("ls", None, &cancel).await.launched());
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_completion_exhaustion_is_error() {
        let fake = ScriptedCompletion::with_replies(["one"]);
        assert_eq!(fake.send_message(&[]).await.unwrap(), "one");
        assert!(fake.send_message(&[]).await.is_err());
        assert_eq!(fake.requests().len(), 2);
    }

    #[test]
    fn test_memory_secrets() {
        let secrets = MemorySecrets::new().with("KEY", "value");
        assert_eq!(secrets.get_secret("KEY").as_deref(), Some("value"));
        assert!(secrets.get_secret("OTHER").is_none());
    }
}
