//! Command routing.
//!
//! Handlers register under a canonical name plus a fixed synonym list; both
//! are normalized with [`normalize_name`] so casing and separators never
//! matter. Required arguments are checked before a handler runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{normalize_name, AgentError, Result, ToolCommand};
use crate::obs;

/// What a handler hands back to the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutput {
    /// Short, secret-free summaries for the UI.
    pub visible: Vec<String>,

    /// Full technical detail for the model (raw logs, responses).
    pub hidden: Vec<String>,

    /// Instruction to send back to the completion service as a new user turn.
    pub follow_up: Option<String>,
}

impl HandlerOutput {
    pub fn visible(text: impl Into<String>) -> Self {
        Self {
            visible: vec![text.into()],
            ..Self::default()
        }
    }

    pub fn with_hidden(mut self, text: impl Into<String>) -> Self {
        self.hidden.push(text.into());
        self
    }

    pub fn with_follow_up(mut self, text: impl Into<String>) -> Self {
        self.follow_up = Some(text.into());
        self
    }
}

/// A tool the completion service can invoke.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Canonical snake_case name.
    fn name(&self) -> &'static str;

    /// Alternative names resolving to this handler.
    fn synonyms(&self) -> &'static [&'static str] {
        &[]
    }

    /// Argument names that must be present before [`handle`](Self::handle) runs.
    fn required_arguments(&self) -> &'static [&'static str] {
        &[]
    }

    /// Extra precondition check, run after required arguments. Returns the
    /// names of anything else that is missing; a non-empty list aborts.
    fn missing_preconditions(&self, _command: &ToolCommand) -> Vec<String> {
        Vec::new()
    }

    async fn handle(&self, command: &ToolCommand, cancel: &CancellationToken) -> HandlerOutput;
}

/// Result of routing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled(HandlerOutput),
    Unknown {
        name: String,
    },
    MissingArguments {
        handler: &'static str,
        missing: Vec<String>,
    },
}

impl RouteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RouteOutcome::Handled(_) => "handled",
            RouteOutcome::Unknown { .. } => "unknown",
            RouteOutcome::MissingArguments { .. } => "missing_arguments",
        }
    }
}

/// Name → handler table.
#[derive(Default, Clone)]
pub struct CommandRouter {
    handlers: Vec<Arc<dyn CommandHandler>>,
    by_name: HashMap<String, usize>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its name and synonyms.
    ///
    /// Fails without modifying the router if any of them is already taken.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> Result<()> {
        let names: Vec<String> = std::iter::once(handler.name())
            .chain(handler.synonyms().iter().copied())
            .map(normalize_name)
            .collect();

        for name in &names {
            if self.by_name.contains_key(name) {
                return Err(AgentError::DuplicateHandler { name: name.clone() });
            }
        }

        let index = self.handlers.len();
        self.handlers.push(handler);
        for name in names {
            self.by_name.insert(name, index);
        }
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, handler: Arc<dyn CommandHandler>) -> Result<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Canonical handler name for an arbitrary spelling, if registered.
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        self.lookup(name).map(|h| h.name())
    }

    /// Canonical names of all registered handlers, in registration order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    fn lookup(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&i| &self.handlers[i])
    }

    /// Dispatch `command`; never fails.
    pub async fn route(&self, command: &ToolCommand, cancel: &CancellationToken) -> RouteOutcome {
        let outcome = match self.lookup(&command.name) {
            None => RouteOutcome::Unknown {
                name: command.name.clone(),
            },
            Some(handler) => {
                let mut missing: Vec<String> = handler
                    .required_arguments()
                    .iter()
                    .filter(|arg| !command.has_argument(arg))
                    .map(|arg| (*arg).to_string())
                    .collect();
                if missing.is_empty() {
                    missing = handler.missing_preconditions(command);
                }

                if missing.is_empty() {
                    RouteOutcome::Handled(handler.handle(command, cancel).await)
                } else {
                    RouteOutcome::MissingArguments {
                        handler: handler.name(),
                        missing,
                    }
                }
            }
        };
        obs::emit_command_routed(&command.name, outcome.label());
        outcome
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler for CountingHandler {
        fn name(&self) -> &'static str {
            "run_android_tests"
        }

        fn synonyms(&self) -> &'static [&'static str] {
            &["run_tests", "run-android-tests", "Android Tests"]
        }

        fn required_arguments(&self) -> &'static [&'static str] {
            &["projectPath"]
        }

        async fn handle(&self, _command: &ToolCommand, _cancel: &CancellationToken) -> HandlerOutput {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HandlerOutput::visible("ran")
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn router() -> (CommandRouter, Arc<CountingHandler>) {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
        });
        let mut router = CommandRouter::new();
        router.register(handler.clone()).unwrap();
        (router, handler)
    }

    #[test]
    fn test_synonyms_resolve_to_same_handler() {
        let (router, _) = router();
        for name in [
            "run_android_tests",
            "run_tests",
            "run-android-tests",
            "RUN TESTS",
            "runAndroidTests",
            "android_tests",
        ] {
            assert_eq!(router.resolve(name), Some("run_android_tests"), "{name}");
        }
        assert_eq!(router.resolve("release_app"), None);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (mut router, handler) = router();
        let err = router.register(handler).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateHandler { .. }));
        assert_eq!(router.handler_names(), vec!["run_android_tests"]);
    }

    #[tokio::test]
    async fn test_route_handled() {
        let (router, handler) = router();
        let cmd = ToolCommand::new("run-tests", args(json!({"project_path": "/p"})));
        let outcome = router.route(&cmd, &CancellationToken::new()).await;
        assert_eq!(outcome, RouteOutcome::Handled(HandlerOutput::visible("ran")));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_route_unknown() {
        let (router, _) = router();
        let cmd = ToolCommand::new("format_disk", Map::new());
        let outcome = router.route(&cmd, &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            RouteOutcome::Unknown {
                name: "format_disk".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_argument_has_no_side_effect() {
        let (router, handler) = router();
        let cmd = ToolCommand::new("run_tests", args(json!({"projectPath": "  "})));
        let outcome = router.route(&cmd, &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            RouteOutcome::MissingArguments {
                handler: "run_android_tests",
                missing: vec!["projectPath".to_string()],
            }
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
