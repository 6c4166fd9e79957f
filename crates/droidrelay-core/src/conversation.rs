//! Dual-channel conversation store.
//!
//! The *visible* channel is what the UI renders. The *hidden* channel holds
//! technical grounding for the model: raw tool-call JSON, full process logs,
//! parse failures. Both channels are append-only.

use crate::domain::{Message, Role};

#[derive(Debug, Clone)]
pub struct ConversationStore {
    system_prompt: Option<Message>,
    visible: Vec<Message>,
    hidden: Vec<Message>,
}

impl ConversationStore {
    /// Start a conversation with the given system prompt (blank means none).
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let prompt = system_prompt.into();
        Self {
            system_prompt: (!prompt.trim().is_empty()).then(|| Message::system(prompt)),
            visible: Vec::new(),
            hidden: Vec::new(),
        }
    }

    /// Append a turn to the visible channel.
    ///
    /// No-op when the newest visible turn has the same role and content.
    /// Returns whether the turn was appended.
    pub fn append_visible(&mut self, message: Message) -> bool {
        if let Some(last) = self.visible.last() {
            if last.role == message.role && last.content == message.content {
                return false;
            }
        }
        self.visible.push(Message {
            visible: true,
            ..message
        });
        true
    }

    /// Append a turn to the hidden channel.
    pub fn append_hidden(&mut self, message: Message) {
        self.hidden.push(message.hidden());
    }

    /// Shorthand for a visible assistant turn.
    pub fn say(&mut self, content: impl Into<String>) -> bool {
        self.append_visible(Message::assistant(content))
    }

    /// Shorthand for a hidden assistant-authored technical note.
    pub fn note(&mut self, content: impl Into<String>) {
        self.append_hidden(Message::new(Role::Assistant, content))
    }

    /// Turns for UI rendering.
    pub fn visible(&self) -> &[Message] {
        &self.visible
    }

    /// Technical turns the UI never renders.
    pub fn hidden(&self) -> &[Message] {
        &self.hidden
    }

    /// Prompt context for the next completion call:
    /// system prompt, then the visible channel, then the hidden channel, then `new_turn`.
    pub fn context_with(&self, new_turn: &Message) -> Vec<Message> {
        self.system_prompt
            .iter()
            .chain(self.visible.iter())
            .chain(self.hidden.iter())
            .chain(std::iter::once(new_turn))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_visible_append_is_noop() {
        let mut store = ConversationStore::new("prompt");
        assert!(store.append_visible(Message::assistant("Build finished.")));
        assert!(!store.append_visible(Message::assistant("Build finished.")));
        assert_eq!(store.visible().len(), 1);
    }

    #[test]
    fn test_same_content_different_role_is_appended() {
        let mut store = ConversationStore::new("");
        store.append_visible(Message::visible_user("ok"));
        store.append_visible(Message::assistant("ok"));
        assert_eq!(store.visible().len(), 2);
    }

    #[test]
    fn test_non_adjacent_duplicate_is_appended() {
        let mut store = ConversationStore::new("");
        store.say("done");
        store.say("next");
        store.say("done");
        assert_eq!(store.visible().len(), 3);
    }

    #[test]
    fn test_hidden_entries_stay_out_of_visible_channel() {
        let mut store = ConversationStore::new("");
        store.note("raw stdout: 4000 lines");
        store.append_hidden(Message::assistant("{\"name\":\"shell\"}"));
        assert!(store.visible().is_empty());
        assert_eq!(store.hidden().len(), 2);
        assert!(store.hidden().iter().all(|m| !m.visible));
    }

    #[test]
    fn test_context_order() {
        let mut store = ConversationStore::new("You are a build assistant.");
        store.append_visible(Message::visible_user("run tests"));
        store.note("exit code 0");
        store.say("All tests passed.");

        let ctx = store.context_with(&Message::user("next"));
        let contents: Vec<&str> = ctx.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "You are a build assistant.",
                "run tests",
                "All tests passed.",
                "exit code 0",
                "next"
            ]
        );
        assert_eq!(ctx[0].role, Role::System);
    }

    #[test]
    fn test_blank_system_prompt_is_omitted() {
        let store = ConversationStore::new("   ");
        let ctx = store.context_with(&Message::user("hi"));
        assert_eq!(ctx.len(), 1);
    }
}
