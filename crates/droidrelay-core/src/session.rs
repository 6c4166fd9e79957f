//! Agent turn loop.
//!
//! One call to [`Agent::send_message`] is one user turn: a completion round
//! trip, classification of the reply, routing of any tool command, and up to
//! `max_follow_ups` chained round trips when a handler asks for one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::classifier::classify;
use crate::config::AgentConfig;
use crate::conversation::ConversationStore;
use crate::domain::{Message, Result};
use crate::obs;
use crate::router::{CommandRouter, RouteOutcome};

/// A chat-completions backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send the full prompt context and return the assistant's reply text.
    async fn send_message(&self, messages: &[Message]) -> Result<String>;
}

/// One routed command within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutedCommand {
    pub name: String,
    pub outcome: &'static str,
}

/// Summary of a user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    /// False when the input was blank and nothing happened.
    pub accepted: bool,
    /// Completion round trips made.
    pub round_trips: usize,
    pub commands: Vec<RoutedCommand>,
    /// Completion failure that ended the turn, if any.
    pub error: Option<String>,
    /// A follow-up was still pending when the bound was hit.
    pub follow_up_limit_reached: bool,
}

/// Conversation driver tying the store, completion service and router together.
pub struct Agent {
    store: ConversationStore,
    completion: Arc<dyn CompletionService>,
    router: CommandRouter,
    config: AgentConfig,
    cancel: CancellationToken,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        completion: Arc<dyn CompletionService>,
        router: CommandRouter,
    ) -> Self {
        Self {
            store: ConversationStore::new(config.system_prompt.clone()),
            completion,
            router,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Token passed to every handler; cancelling it stops commands that have
    /// not been launched yet.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one user turn. Blank input is ignored.
    #[instrument(skip_all)]
    pub async fn send_message(&mut self, text: &str) -> TurnReport {
        let text = text.trim();
        if text.is_empty() {
            return TurnReport::default();
        }

        let mut report = TurnReport {
            accepted: true,
            ..TurnReport::default()
        };
        obs::emit_turn_started(self.store.visible().len(), self.store.hidden().len());

        // The model sees the text once, as the new turn.
        let mut turn = Message::user(text);
        let mut context = self.store.context_with(&turn);
        self.store.append_visible(Message::visible_user(text));

        loop {
            let reply = match self.completion.send_message(&context).await {
                Ok(reply) => reply,
                Err(e) => {
                    obs::emit_completion_error(&e);
                    self.store.say(format!("Error: {e}"));
                    report.error = Some(e.to_string());
                    break;
                }
            };
            report.round_trips += 1;

            let Some(follow_up) = self.handle_reply(&reply, &mut report).await else {
                break;
            };
            if report.round_trips > self.config.max_follow_ups {
                warn!(
                    max_follow_ups = self.config.max_follow_ups,
                    "follow-up limit reached, dropping pending instruction"
                );
                report.follow_up_limit_reached = true;
                self.store
                    .say("Stopped: too many chained tool steps in one turn.");
                break;
            }
            turn = Message::user(follow_up);
            context = self.store.context_with(&turn);
        }

        report
    }

    /// Fold one completion reply into the store; returns a pending follow-up.
    async fn handle_reply(&mut self, reply: &str, report: &mut TurnReport) -> Option<String> {
        let classification = classify(reply);
        obs::emit_reply_classified(
            classification.command.is_some(),
            classification.human_text.is_some(),
        );

        if let Some(human) = &classification.human_text {
            self.store.say(human.clone());
        }
        if classification.command.is_none() {
            return None;
        }
        self.store.note(reply);

        let command = match classification.tool_command() {
            Ok(Some(command)) => command,
            Ok(None) => return None,
            Err(e) => {
                obs::emit_command_routed("", "malformed");
                report.commands.push(RoutedCommand {
                    name: String::new(),
                    outcome: "malformed",
                });
                self.store.say(format!("Cannot parse command: {e}"));
                return None;
            }
        };

        let outcome = self.router.route(&command, &self.cancel).await;
        report.commands.push(RoutedCommand {
            name: command.name.clone(),
            outcome: outcome.label(),
        });

        match outcome {
            RouteOutcome::Handled(output) => {
                for text in output.visible {
                    self.store.say(text);
                }
                for text in output.hidden {
                    self.store.note(text);
                }
                output.follow_up
            }
            RouteOutcome::Unknown { name } => {
                self.store.say(format!("Unknown command: {name}"));
                None
            }
            RouteOutcome::MissingArguments { handler, missing } => {
                self.store.say(format!(
                    "Cannot run {handler}: missing {}",
                    missing.join(", ")
                ));
                None
            }
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("router", &self.router)
            .field("visible", &self.store.visible().len())
            .field("hidden", &self.store.hidden().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::fakes::ScriptedCompletion;

    fn agent(fake: Arc<ScriptedCompletion>) -> Agent {
        Agent::new(AgentConfig::default(), fake, CommandRouter::new())
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let fake = Arc::new(ScriptedCompletion::new());
        let mut agent = agent(fake.clone());
        let report = agent.send_message("   \n").await;
        assert!(!report.accepted);
        assert!(fake.requests().is_empty());
        assert!(agent.store().visible().is_empty());
    }

    #[tokio::test]
    async fn test_plain_chat_reply() {
        let fake = Arc::new(ScriptedCompletion::with_replies(["Hello there."]));
        let mut agent = agent(fake.clone());
        let report = agent.send_message("hi").await;

        assert_eq!(report.round_trips, 1);
        let visible = agent.store().visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].role, Role::VisibleUser);
        assert_eq!(visible[1].content, "Hello there.");
        assert!(agent.store().hidden().is_empty());

        let sent = &fake.requests()[0];
        assert_eq!(sent.first().map(|m| m.role), Some(Role::System));
        assert_eq!(sent.last().map(|m| m.content.as_str()), Some("hi"));
        assert_eq!(sent.iter().filter(|m| m.content == "hi").count(), 1);
    }

    #[tokio::test]
    async fn test_completion_error_is_visible() {
        let fake = Arc::new(ScriptedCompletion::new());
        fake.push_error("HTTP 503");
        let mut agent = agent(fake);
        let report = agent.send_message("build it").await;

        assert!(report.error.is_some());
        let last = agent.store().visible().last().cloned().unwrap();
        assert!(last.content.starts_with("Error: "));
        assert!(last.content.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_commands_continue() {
        let fake = Arc::new(ScriptedCompletion::with_replies([
            r#"{"name": "format_disk", "arguments": {}}"#,
            r#"{"arguments": {"command": "ls"}}"#,
            "ok",
        ]));
        let mut agent = agent(fake);

        let report = agent.send_message("one").await;
        assert_eq!(report.commands[0].outcome, "unknown");
        assert!(agent
            .store()
            .visible()
            .iter()
            .any(|m| m.content == "Unknown command: format_disk"));

        let report = agent.send_message("two").await;
        assert_eq!(report.commands[0].outcome, "malformed");
        assert!(agent
            .store()
            .visible()
            .iter()
            .any(|m| m.content.starts_with("Cannot parse command")));

        let report = agent.send_message("three").await;
        assert!(report.commands.is_empty());
        assert_eq!(agent.store().hidden().len(), 2);
    }
}
